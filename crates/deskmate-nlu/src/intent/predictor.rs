//! Thresholded multi-label prediction on top of [`IntentModel`].

use std::path::Path;

use tracing::debug;

use deskmate_core::types::{IntentLabel, IntentScore};

use super::model::IntentModel;
use crate::error::IntentError;

/// Result of classifying one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Labels at or above the threshold, highest first. Never empty: when no
    /// label qualifies this holds the single best guess.
    pub intents: Vec<IntentScore>,
    /// Every label's score, highest first.
    pub scores: Vec<IntentScore>,
    /// True when `intents` is a fallback guess below the threshold.
    pub low_confidence: bool,
}

impl Prediction {
    /// The highest scoring intent.
    pub fn top(&self) -> IntentScore {
        self.intents[0]
    }

    pub fn labels(&self) -> Vec<IntentLabel> {
        self.intents.iter().map(|s| s.label).collect()
    }

    pub fn confidence_of(&self, label: IntentLabel) -> f32 {
        self.scores
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.confidence)
            .unwrap_or(0.0)
    }
}

/// Multi-label intent classifier.
pub struct IntentPredictor {
    model: IntentModel,
    threshold: f32,
}

impl IntentPredictor {
    pub fn new(model: IntentModel, threshold: f32) -> Self {
        Self { model, threshold }
    }

    /// Load the model artifact at `path`. Fails if it is missing or corrupt.
    pub fn load(path: &Path, threshold: f32) -> Result<Self, IntentError> {
        Ok(Self::new(IntentModel::load(path)?, threshold))
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn model(&self) -> &IntentModel {
        &self.model
    }

    /// Classify `text`.
    pub fn predict(&self, text: &str) -> Prediction {
        let mut scores = self.model.probabilities(text);
        // Stable sort keeps model label order among equal scores.
        scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut intents: Vec<IntentScore> = scores
            .iter()
            .filter(|s| s.confidence >= self.threshold)
            .copied()
            .collect();

        let low_confidence = intents.is_empty();
        if low_confidence {
            intents.push(scores[0]);
        }

        debug!(
            top = %intents[0].label,
            confidence = intents[0].confidence,
            count = intents.len(),
            low_confidence,
            "Intent predicted"
        );

        Prediction {
            intents,
            scores,
            low_confidence,
        }
    }

    /// True when the two best scores are closer than `margin`.
    pub fn is_ambiguous(prediction: &Prediction, margin: f32) -> bool {
        match prediction.scores.as_slice() {
            [first, second, ..] => first.confidence - second.confidence < margin,
            _ => false,
        }
    }
}
