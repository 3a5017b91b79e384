//! Error types for the conversational layer.

use deskmate_analytics::AnalyticsError;
use deskmate_core::error::DeskmateError;

/// Errors from the chat engine.
///
/// Turn handling never fails; these cover session operations such as
/// feedback.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("turn not found in session context: {0}")]
    TurnNotFound(uuid::Uuid),
    #[error("no reply to rate yet")]
    NoTurnYet,
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

impl From<ChatError> for DeskmateError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Analytics(inner) => inner.into(),
            other => DeskmateError::Chat(other.to_string()),
        }
    }
}
