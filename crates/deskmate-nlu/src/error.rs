use std::path::PathBuf;

use deskmate_core::error::DeskmateError;
use thiserror::Error;

/// Errors raised while loading the intent model artifact.
///
/// Prediction itself never fails; every variant here is a load-time error.
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("intent model not found at {0} (install one with `deskmate build-index --intent-model <file>`)")]
    ModelNotFound(PathBuf),
    #[error("corrupt intent model: {0}")]
    CorruptModel(String),
    #[error("unsupported intent model version {0}")]
    UnsupportedVersion(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for IntentError {
    fn from(err: serde_json::Error) -> Self {
        IntentError::CorruptModel(err.to_string())
    }
}

impl From<IntentError> for DeskmateError {
    fn from(err: IntentError) -> Self {
        match err {
            IntentError::ModelNotFound(_) => DeskmateError::NotReady(err.to_string()),
            other => DeskmateError::Model(other.to_string()),
        }
    }
}
