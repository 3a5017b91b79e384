//! Intent prediction for support queries.
//!
//! A fitted TF-IDF vocabulary and one-vs-rest logistic weights are loaded
//! from a JSON artifact. Prediction is pure: the same text always yields the
//! same scores.

pub mod model;
pub mod predictor;

pub use model::{IntentModel, IntentModelArtifact, VocabularyTerm, MODEL_FORMAT_VERSION};
pub use predictor::{IntentPredictor, Prediction};
