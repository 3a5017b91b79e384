use deskmate_core::error::DeskmateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AnalyticsError> for DeskmateError {
    fn from(err: AnalyticsError) -> Self {
        DeskmateError::Analytics(err.to_string())
    }
}
