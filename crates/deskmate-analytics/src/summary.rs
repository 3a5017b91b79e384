//! Offline statistics over a queries log.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use deskmate_core::types::Satisfaction;

use crate::error::AnalyticsError;
use crate::log::{FailedRecord, FailurePolicy, LogEvent};

/// Aggregates computed from `queries_log.jsonl`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub total_turns: usize,
    pub avg_confidence: f32,
    /// Mean over turns that ran retrieval.
    pub avg_similarity: f32,
    pub avg_elapsed_ms: f64,
    pub positive: usize,
    pub negative: usize,
    /// Percentage of rated turns rated positive; 0 when nothing was rated.
    pub satisfaction_rate: f32,
    pub intent_distribution: BTreeMap<String, usize>,
    pub failed_turns: usize,
    /// Lines that could not be parsed.
    pub skipped_lines: usize,
}

impl LogSummary {
    /// Summarize the log at `path`. A missing file yields an empty summary.
    pub fn from_path(path: &Path, policy: FailurePolicy) -> Result<Self, AnalyticsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_reader(BufReader::new(File::open(path)?), policy)
    }

    /// Summarize a JSON-lines log.
    ///
    /// When a turn was rated more than once the latest rating counts.
    pub fn from_reader<R: BufRead>(reader: R, policy: FailurePolicy) -> Result<Self, AnalyticsError> {
        let mut summary = LogSummary::default();
        let mut confidence_sum = 0.0f64;
        let mut similarity_sum = 0.0f64;
        let mut similarity_count = 0usize;
        let mut elapsed_sum = 0.0f64;
        let mut ratings: HashMap<Uuid, Satisfaction> = HashMap::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: LogEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(line = number + 1, error = %e, "Skipping malformed analytics line");
                    summary.skipped_lines += 1;
                    continue;
                }
            };

            match event {
                LogEvent::Turn(record) => {
                    summary.total_turns += 1;
                    confidence_sum += f64::from(record.confidence);
                    elapsed_sum += record.elapsed_ms;
                    if let Some(s) = record.similarity {
                        similarity_sum += f64::from(s);
                        similarity_count += 1;
                    }
                    for score in &record.intents {
                        *summary
                            .intent_distribution
                            .entry(score.label.to_string())
                            .or_insert(0) += 1;
                    }
                    if policy.evaluate(&record).is_some() {
                        summary.failed_turns += 1;
                    }
                }
                LogEvent::Feedback(feedback) => {
                    ratings.insert(feedback.turn_id, feedback.satisfaction);
                }
            }
        }

        if summary.total_turns > 0 {
            summary.avg_confidence = (confidence_sum / summary.total_turns as f64) as f32;
            summary.avg_elapsed_ms = elapsed_sum / summary.total_turns as f64;
        }
        if similarity_count > 0 {
            summary.avg_similarity = (similarity_sum / similarity_count as f64) as f32;
        }

        summary.positive = ratings
            .values()
            .filter(|s| **s == Satisfaction::Positive)
            .count();
        summary.negative = ratings.len() - summary.positive;
        if !ratings.is_empty() {
            summary.satisfaction_rate = summary.positive as f32 / ratings.len() as f32 * 100.0;
        }

        Ok(summary)
    }

    /// The last `limit` rows of a failed-query log, oldest first.
    pub fn recent_failures(path: &Path, limit: usize) -> Result<Vec<FailedRecord>, AnalyticsError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FailedRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping malformed failed-query line"),
            }
        }
        let start = records.len().saturating_sub(limit);
        Ok(records.split_off(start))
    }
}
