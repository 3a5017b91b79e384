//! Natural-language understanding for Deskmate.
//!
//! - Regex entity extraction (account numbers, orders, dates, amounts)
//! - Multi-label intent prediction from a fitted TF-IDF + logistic model
//! - Shared tokenization used by the classifier and the embedder

pub mod entity;
pub mod error;
pub mod intent;
pub mod text;

pub use entity::EntityExtractor;
pub use error::IntentError;
pub use intent::{IntentModel, IntentModelArtifact, IntentPredictor, Prediction, VocabularyTerm};
