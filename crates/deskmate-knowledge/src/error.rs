use std::path::PathBuf;

use deskmate_core::error::DeskmateError;
use thiserror::Error;

/// Errors raised by the FAQ index and knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("FAQ index not found at {0} (run `deskmate build-index` first)")]
    IndexNotFound(PathBuf),
    #[error("corrupt FAQ index: {0}")]
    CorruptIndex(String),
    #[error("unsupported FAQ index version {0}")]
    UnsupportedVersion(u32),
    #[error("FAQ index has no entries")]
    EmptyIndex,
    #[error("duplicate FAQ id: {0}")]
    DuplicateId(String),
    #[error("FAQ entry {0} has no embeddable content")]
    EmptyEmbedding(String),
    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid FAQ source: {0}")]
    InvalidSource(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::CorruptIndex(err.to_string())
    }
}

impl From<KnowledgeError> for DeskmateError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::IndexNotFound(_) => DeskmateError::NotReady(err.to_string()),
            KnowledgeError::Io(io) => DeskmateError::Io(io),
            other => DeskmateError::Knowledge(other.to_string()),
        }
    }
}
