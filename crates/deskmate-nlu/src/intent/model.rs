//! The fitted intent model and its on-disk artifact.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use deskmate_core::types::{IntentLabel, IntentScore};

use crate::error::IntentError;
use crate::text;

/// Artifact format version understood by this build.
pub const MODEL_FORMAT_VERSION: u32 = 1;

const MAX_NGRAM: usize = 5;

/// On-disk form of a fitted model, as exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentModelArtifact {
    pub version: u32,
    pub labels: Vec<IntentLabel>,
    /// Inclusive n-gram range, e.g. `[1, 2]`.
    pub ngram_range: (usize, usize),
    pub intercepts: BTreeMap<IntentLabel, f32>,
    pub vocabulary: Vec<VocabularyTerm>,
}

/// One vocabulary entry: the term, its inverse document frequency and the
/// per-label logistic coefficient. Missing coefficients are zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTerm {
    pub term: String,
    pub idf: f32,
    #[serde(default)]
    pub coef: BTreeMap<IntentLabel, f32>,
}

/// A validated, ready-to-score intent model.
#[derive(Debug, Clone)]
pub struct IntentModel {
    labels: Vec<IntentLabel>,
    ngram_range: (usize, usize),
    index: HashMap<String, usize>,
    idf: Vec<f32>,
    /// `weights[term][label]`, labels in `self.labels` order.
    weights: Vec<Vec<f32>>,
    intercepts: Vec<f32>,
}

impl IntentModel {
    /// Load and validate a model artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, IntentError> {
        if !path.exists() {
            return Err(IntentError::ModelNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let artifact: IntentModelArtifact = serde_json::from_str(&content)?;
        let model = Self::from_artifact(artifact)?;
        info!(
            path = %path.display(),
            labels = model.labels.len(),
            vocabulary = model.idf.len(),
            "Intent model loaded"
        );
        Ok(model)
    }

    /// Validate an artifact and build the lookup tables.
    pub fn from_artifact(artifact: IntentModelArtifact) -> Result<Self, IntentError> {
        if artifact.version != MODEL_FORMAT_VERSION {
            return Err(IntentError::UnsupportedVersion(artifact.version));
        }
        if artifact.labels.is_empty() {
            return Err(IntentError::CorruptModel("no labels".into()));
        }
        let mut seen = HashSet::new();
        for label in &artifact.labels {
            if !seen.insert(*label) {
                return Err(IntentError::CorruptModel(format!("duplicate label {}", label)));
            }
        }

        let (min_n, max_n) = artifact.ngram_range;
        if min_n < 1 || min_n > max_n || max_n > MAX_NGRAM {
            return Err(IntentError::CorruptModel(format!(
                "invalid ngram range ({}, {})",
                min_n, max_n
            )));
        }

        let position: HashMap<IntentLabel, usize> = artifact
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (*l, i))
            .collect();

        let mut intercepts = vec![0.0; artifact.labels.len()];
        for label in &artifact.labels {
            let b = artifact.intercepts.get(label).copied().ok_or_else(|| {
                IntentError::CorruptModel(format!("missing intercept for {}", label))
            })?;
            if !b.is_finite() {
                return Err(IntentError::CorruptModel(format!("non-finite intercept for {}", label)));
            }
            intercepts[position[label]] = b;
        }
        if let Some(extra) = artifact.intercepts.keys().find(|l| !position.contains_key(l)) {
            return Err(IntentError::CorruptModel(format!(
                "intercept for undeclared label {}",
                extra
            )));
        }

        if artifact.vocabulary.is_empty() {
            return Err(IntentError::CorruptModel("empty vocabulary".into()));
        }

        let mut index = HashMap::with_capacity(artifact.vocabulary.len());
        let mut idf = Vec::with_capacity(artifact.vocabulary.len());
        let mut weights = Vec::with_capacity(artifact.vocabulary.len());

        for entry in artifact.vocabulary {
            if entry.term.trim().is_empty() {
                return Err(IntentError::CorruptModel("empty vocabulary term".into()));
            }
            if !entry.idf.is_finite() || entry.idf <= 0.0 {
                return Err(IntentError::CorruptModel(format!(
                    "invalid idf {} for term '{}'",
                    entry.idf, entry.term
                )));
            }
            let mut row = vec![0.0; position.len()];
            for (label, w) in &entry.coef {
                let Some(&pos) = position.get(label) else {
                    return Err(IntentError::CorruptModel(format!(
                        "term '{}' has a coefficient for undeclared label {}",
                        entry.term, label
                    )));
                };
                if !w.is_finite() {
                    return Err(IntentError::CorruptModel(format!(
                        "non-finite coefficient for term '{}'",
                        entry.term
                    )));
                }
                row[pos] = *w;
            }
            if index.insert(entry.term.clone(), idf.len()).is_some() {
                return Err(IntentError::CorruptModel(format!(
                    "duplicate term '{}'",
                    entry.term
                )));
            }
            idf.push(entry.idf);
            weights.push(row);
        }

        Ok(Self {
            labels: artifact.labels,
            ngram_range: (min_n, max_n),
            index,
            idf,
            weights,
            intercepts,
        })
    }

    /// Labels in model order.
    pub fn labels(&self) -> &[IntentLabel] {
        &self.labels
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// TF-IDF vector for `input` as sparse `(term index, weight)` pairs,
    /// L2-normalised. Empty when no vocabulary term occurs.
    pub fn vectorize(&self, input: &str) -> Vec<(usize, f32)> {
        let tokens = text::content_tokens(input);
        let (min_n, max_n) = self.ngram_range;

        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for gram in text::ngrams(&tokens, min_n, max_n) {
            if let Some(&i) = self.index.get(&gram) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        let norm = vector.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    /// Per-label probability `σ(w·x + b)`, in model label order.
    pub fn probabilities(&self, input: &str) -> Vec<IntentScore> {
        let x = self.vectorize(input);
        self.labels
            .iter()
            .enumerate()
            .map(|(pos, label)| {
                let z = self.intercepts[pos]
                    + x.iter().map(|(i, v)| v * self.weights[*i][pos]).sum::<f32>();
                IntentScore {
                    label: *label,
                    confidence: sigmoid(z),
                }
            })
            .collect()
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}
