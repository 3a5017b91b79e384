use thiserror::Error;

/// Top-level error type for Deskmate.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for DeskmateError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeskmateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("Analytics error: {0}")]
    Analytics(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not ready: {0}")]
    NotReady(String),
}

impl From<toml::de::Error> for DeskmateError {
    fn from(err: toml::de::Error) -> Self {
        DeskmateError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DeskmateError {
    fn from(err: toml::ser::Error) -> Self {
        DeskmateError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DeskmateError {
    fn from(err: serde_json::Error) -> Self {
        DeskmateError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Deskmate operations.
pub type Result<T> = std::result::Result<T, DeskmateError>;
