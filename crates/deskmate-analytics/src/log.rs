//! The analytics writer.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use deskmate_core::types::{IntentLabel, IntentScore, ReplyKind, Satisfaction, Turn};

use crate::error::AnalyticsError;

pub const QUERIES_LOG_FILE: &str = "queries_log.jsonl";
pub const FAILED_LOG_FILE: &str = "failed_queries.jsonl";

// =============================================================================
// Records
// =============================================================================

/// One line of `queries_log.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    Turn(TurnRecord),
    Feedback(FeedbackRecord),
}

/// A processed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten: Option<String>,
    pub intents: Vec<IntentScore>,
    /// Top intent confidence.
    pub confidence: f32,
    /// Best retrieval similarity, absent when no retrieval ran.
    pub similarity: Option<f32>,
    pub elapsed_ms: f64,
    pub reply_kind: ReplyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_faq_id: Option<String>,
}

impl TurnRecord {
    pub fn from_turn(session_id: Uuid, turn: &Turn, elapsed: Duration) -> Self {
        Self {
            turn_id: turn.id,
            session_id,
            timestamp: turn.timestamp,
            query: turn.raw_text.clone(),
            rewritten: turn.rewritten_text.clone(),
            intents: turn.intents.clone(),
            confidence: turn.top_confidence(),
            similarity: turn.similarity,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            reply_kind: turn.reply_kind,
            matched_faq_id: turn.matched_faq_id.clone(),
        }
    }
}

/// Thumbs up / down on an earlier turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub turn_id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub satisfaction: Satisfaction,
}

/// One line of `failed_queries.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub intents: Vec<IntentLabel>,
    pub confidence: f32,
    pub similarity: Option<f32>,
    pub reason: String,
}

// =============================================================================
// Failure policy and counts
// =============================================================================

/// When a turn counts as failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailurePolicy {
    /// Top intent confidence below this fails the turn.
    pub confidence_threshold: f32,
    /// Best similarity below this fails the turn.
    pub similarity_floor: f32,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            similarity_floor: 0.65,
        }
    }
}

impl FailurePolicy {
    /// Reasons `record` failed, joined by `"; "`. `None` for a good turn.
    pub fn evaluate(&self, record: &TurnRecord) -> Option<String> {
        let mut reasons = Vec::new();
        match record.similarity {
            Some(s) if s < self.similarity_floor => reasons.push(format!("Low similarity ({:.2})", s)),
            Some(_) => {}
            None => reasons.push("No answer retrieved".to_string()),
        }
        if record.confidence < self.confidence_threshold {
            reasons.push(format!("Low confidence ({:.2})", record.confidence));
        }
        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}

/// Counters kept while the log is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunningCounts {
    pub turns: usize,
    pub failed: usize,
    pub positive: usize,
    pub negative: usize,
    pub per_intent: BTreeMap<IntentLabel, usize>,
}

// =============================================================================
// Writer
// =============================================================================

/// Append-only analytics writer. Every append is flushed before returning.
pub struct AnalyticsLog {
    dir: PathBuf,
    queries: File,
    failed: File,
    policy: FailurePolicy,
    counts: RunningCounts,
}

impl AnalyticsLog {
    /// Open (or create) the log files under `dir`.
    pub fn open(dir: &Path, policy: FailurePolicy) -> Result<Self, AnalyticsError> {
        std::fs::create_dir_all(dir)?;
        let queries = open_append(&dir.join(QUERIES_LOG_FILE))?;
        let failed = open_append(&dir.join(FAILED_LOG_FILE))?;
        info!(dir = %dir.display(), "Analytics log opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            queries,
            failed,
            policy,
            counts: RunningCounts::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn queries_path(&self) -> PathBuf {
        self.dir.join(QUERIES_LOG_FILE)
    }

    pub fn failed_path(&self) -> PathBuf {
        self.dir.join(FAILED_LOG_FILE)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn counts(&self) -> &RunningCounts {
        &self.counts
    }

    /// Append a turn, and a failed-query row if the policy flags it.
    /// Returns the failure reason, if any.
    pub fn record_turn(
        &mut self,
        session_id: Uuid,
        turn: &Turn,
        elapsed: Duration,
    ) -> Result<Option<String>, AnalyticsError> {
        let record = TurnRecord::from_turn(session_id, turn, elapsed);
        let reason = self.policy.evaluate(&record);

        write_line(&mut self.queries, &LogEvent::Turn(record.clone()))?;
        self.counts.turns += 1;
        for score in &record.intents {
            *self.counts.per_intent.entry(score.label).or_insert(0) += 1;
        }

        if let Some(reason) = &reason {
            self.append_failed(&record, reason.clone())?;
        }

        debug!(
            turn_id = %record.turn_id,
            failed = reason.is_some(),
            elapsed_ms = record.elapsed_ms,
            "Turn logged"
        );
        Ok(reason)
    }

    /// Append a feedback event for `turn`. Negative feedback also lands in
    /// the failed-query log.
    pub fn record_feedback(
        &mut self,
        session_id: Uuid,
        turn: &Turn,
        satisfaction: Satisfaction,
    ) -> Result<(), AnalyticsError> {
        let event = FeedbackRecord {
            turn_id: turn.id,
            session_id,
            timestamp: Utc::now(),
            satisfaction,
        };
        write_line(&mut self.queries, &LogEvent::Feedback(event))?;

        match satisfaction {
            Satisfaction::Positive => self.counts.positive += 1,
            Satisfaction::Negative => {
                self.counts.negative += 1;
                let record = TurnRecord::from_turn(session_id, turn, Duration::ZERO);
                self.append_failed(&record, "User marked as not helpful".to_string())?;
            }
        }
        debug!(turn_id = %turn.id, ?satisfaction, "Feedback logged");
        Ok(())
    }

    fn append_failed(&mut self, record: &TurnRecord, reason: String) -> Result<(), AnalyticsError> {
        let failed = FailedRecord {
            turn_id: record.turn_id,
            timestamp: Utc::now(),
            query: record.query.clone(),
            intents: record.intents.iter().map(|s| s.label).collect(),
            confidence: record.confidence,
            similarity: record.similarity,
            reason,
        };
        write_line(&mut self.failed, &failed)?;
        self.counts.failed += 1;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, AnalyticsError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn write_line<T: Serialize>(file: &mut File, value: &T) -> Result<(), AnalyticsError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}
