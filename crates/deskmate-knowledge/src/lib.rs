//! Deskmate knowledge crate - FAQ embeddings, nearest-neighbour index and lookup.
//!
//! Provides an embedder trait with a deterministic hashed bag-of-words
//! implementation, a read-only FAQ index with exhaustive Euclidean search,
//! and a knowledge base that layers intent filtering and confidence bands
//! on top.

pub mod base;
pub mod embedding;
pub mod error;
pub mod index;

pub use base::{load_faq_source, ConfidenceBand, FaqMatch, KnowledgeBase, KnowledgeStats};
pub use embedding::{Embedder, HashedBagOfWords};
pub use error::KnowledgeError;
pub use index::{FaqIndex, FaqIndexArtifact, IndexHit};
