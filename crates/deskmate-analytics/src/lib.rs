//! Append-only analytics for Deskmate conversations.
//!
//! Every turn is written to `queries_log.jsonl` as it happens. Turns with a
//! weak answer or a low-confidence intent are also written to
//! `failed_queries.jsonl` with a reason. Feedback is a separate event that
//! references the turn id; earlier rows are never rewritten.

pub mod error;
pub mod log;
pub mod summary;

pub use error::AnalyticsError;
pub use log::{
    AnalyticsLog, FailedRecord, FailurePolicy, FeedbackRecord, LogEvent, RunningCounts,
    TurnRecord, FAILED_LOG_FILE, QUERIES_LOG_FILE,
};
pub use summary::LogSummary;
