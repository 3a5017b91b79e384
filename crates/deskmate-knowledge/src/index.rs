//! Read-only FAQ index with exhaustive Euclidean nearest-neighbour search.
//!
//! Embeddings are stored L2-normalised, so the squared distance between a
//! unit query and an entry lies in [0, 4] and maps onto a similarity in
//! [0, 1] via `1 - d²/4`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use deskmate_core::types::{FaqEntry, IntentLabel};

use crate::embedding::{normalize, Embedder};
use crate::error::KnowledgeError;

/// Index artifact format version understood by this build.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Embeddings whose norm is this close to 1 are stored as given.
const UNIT_NORM_TOLERANCE: f32 = 1e-4;

/// On-disk form of a built index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqIndexArtifact {
    pub version: u32,
    pub dimension: usize,
    /// Name of the embedder the index was built with.
    #[serde(default)]
    pub embedder: String,
    pub entries: Vec<FaqEntry>,
    pub embeddings: Vec<Vec<f32>>,
}

/// A single hit from [`FaqIndex::search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Position of the entry in the index.
    pub position: usize,
    /// Euclidean distance to the normalised query.
    pub distance: f32,
    /// `clamp(1 - d²/4, 0, 1)`.
    pub similarity: f32,
}

/// FAQ entries and their embeddings. Immutable once built or loaded.
#[derive(Debug, Clone)]
pub struct FaqIndex {
    dimension: usize,
    embedder: String,
    entries: Vec<FaqEntry>,
    embeddings: Vec<Vec<f32>>,
}

impl FaqIndex {
    /// Embed every entry's question with `embedder` and build the index.
    pub fn build(entries: Vec<FaqEntry>, embedder: &dyn Embedder) -> Result<Self, KnowledgeError> {
        let embeddings = entries.iter().map(|e| embedder.embed(&e.question)).collect();
        let index = Self::from_parts(embedder.dimensions(), embedder.name(), entries, embeddings)?;
        info!(
            entries = index.len(),
            dimension = index.dimension,
            embedder = %index.embedder,
            "FAQ index built"
        );
        Ok(index)
    }

    /// Load an index artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        if !path.exists() {
            return Err(KnowledgeError::IndexNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let artifact: FaqIndexArtifact = serde_json::from_str(&content)?;
        let index = Self::from_artifact(artifact)?;
        info!(
            path = %path.display(),
            entries = index.len(),
            dimension = index.dimension,
            "FAQ index loaded"
        );
        Ok(index)
    }

    /// Validate an artifact.
    pub fn from_artifact(artifact: FaqIndexArtifact) -> Result<Self, KnowledgeError> {
        if artifact.version != INDEX_FORMAT_VERSION {
            return Err(KnowledgeError::UnsupportedVersion(artifact.version));
        }
        Self::from_parts(
            artifact.dimension,
            artifact.embedder,
            artifact.entries,
            artifact.embeddings,
        )
    }

    fn from_parts(
        dimension: usize,
        embedder: String,
        entries: Vec<FaqEntry>,
        mut embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, KnowledgeError> {
        if entries.is_empty() {
            return Err(KnowledgeError::EmptyIndex);
        }
        if dimension == 0 {
            return Err(KnowledgeError::CorruptIndex("dimension is zero".into()));
        }
        if entries.len() != embeddings.len() {
            return Err(KnowledgeError::CorruptIndex(format!(
                "{} entries but {} embeddings",
                entries.len(),
                embeddings.len()
            )));
        }

        let mut ids = HashSet::new();
        for (entry, embedding) in entries.iter().zip(embeddings.iter_mut()) {
            if !ids.insert(entry.id.as_str()) {
                return Err(KnowledgeError::DuplicateId(entry.id.clone()));
            }
            if embedding.len() != dimension {
                return Err(KnowledgeError::CorruptIndex(format!(
                    "entry {} has dimension {}, expected {}",
                    entry.id,
                    embedding.len(),
                    dimension
                )));
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(KnowledgeError::CorruptIndex(format!(
                    "entry {} has non-finite values",
                    entry.id
                )));
            }
            let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm == 0.0 {
                return Err(KnowledgeError::EmptyEmbedding(entry.id.clone()));
            }
            if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
                normalize(embedding);
            }
        }

        Ok(Self {
            dimension,
            embedder,
            entries,
            embeddings,
        })
    }

    /// Write the index as a JSON artifact, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), KnowledgeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let artifact = FaqIndexArtifact {
            version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            embedder: self.embedder.clone(),
            entries: self.entries.clone(),
            embeddings: self.embeddings.clone(),
        };
        std::fs::write(path, serde_json::to_string(&artifact)?)?;
        info!(path = %path.display(), entries = self.len(), "FAQ index saved");
        Ok(())
    }

    /// Top-`k` entries nearest to `query`, nearest first.
    ///
    /// With `intent` set, only entries tagged with that intent are
    /// considered. Ties keep index order. A zero-norm query scores 0
    /// against every entry.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        intent: Option<IntentLabel>,
    ) -> Result<Vec<IndexHit>, KnowledgeError> {
        if query.len() != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut unit = query.to_vec();
        normalize(&mut unit);
        let directionless = unit.iter().all(|x| *x == 0.0) || unit.iter().any(|x| !x.is_finite());

        let mut hits: Vec<IndexHit> = self
            .entries
            .iter()
            .zip(&self.embeddings)
            .enumerate()
            .filter(|(_, (entry, _))| intent.is_none() || entry.intent == intent)
            .map(|(position, (_, embedding))| {
                if directionless {
                    return IndexHit {
                        position,
                        distance: f32::MAX,
                        similarity: 0.0,
                    };
                }
                let d2: f32 = unit
                    .iter()
                    .zip(embedding)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                IndexHit {
                    position,
                    distance: d2.sqrt(),
                    similarity: (1.0 - d2 / 4.0).clamp(0.0, 1.0),
                }
            })
            .collect();

        // Stable: equal distances keep index order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn entry(&self, position: usize) -> Option<&FaqEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedBagOfWords;

    fn faq(id: &str, question: &str, intent: Option<IntentLabel>) -> FaqEntry {
        FaqEntry {
            id: id.to_string(),
            question: question.to_string(),
            answer: format!("answer to {}", id),
            category: intent.map(|i| i.to_string()).unwrap_or_default(),
            intent,
        }
    }

    fn sample_entries() -> Vec<FaqEntry> {
        vec![
            faq("faq-001", "How do I reset my password?", Some(IntentLabel::Technical)),
            faq("faq-002", "How do I update my email address?", Some(IntentLabel::Account)),
            faq("faq-003", "When will I receive my refund?", Some(IntentLabel::Billing)),
        ]
    }

    fn build() -> (FaqIndex, HashedBagOfWords) {
        let embedder = HashedBagOfWords::new(256);
        (FaqIndex::build(sample_entries(), &embedder).unwrap(), embedder)
    }

    #[test]
    fn test_build_and_exact_match() {
        let (index, embedder) = build();
        assert_eq!(index.len(), 3);
        let hits = index.search(&embedder.embed("reset password"), 3, None).unwrap();
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert!(hits[0].distance < 1e-3);
    }

    #[test]
    fn test_results_sorted_and_in_range() {
        let (index, embedder) = build();
        let hits = index
            .search(&embedder.embed("password email refund"), 3, None)
            .unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.similarity));
        }
    }

    #[test]
    fn test_similarity_matches_cosine_for_unit_vectors() {
        let (index, embedder) = build();
        let q = embedder.embed("reset password email");
        let hits = index.search(&q, 1, None).unwrap();
        // {reset, password, email} vs {reset, password}: cos = 2 / (sqrt3 * sqrt2)
        let cos = 2.0 / (3.0f32.sqrt() * 2.0f32.sqrt());
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].similarity - (1.0 + cos) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_truncates_to_k() {
        let (index, embedder) = build();
        let hits = index.search(&embedder.embed("refund"), 1, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(index.entry(hits[0].position).unwrap().id, "faq-003");
    }

    #[test]
    fn test_intent_filter() {
        let (index, embedder) = build();
        let hits = index
            .search(&embedder.embed("reset password"), 3, Some(IntentLabel::Billing))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 2);

        let hits = index
            .search(&embedder.embed("reset password"), 3, Some(IntentLabel::Complaint))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_zero_query_scores_zero_in_index_order() {
        let (index, _) = build();
        let hits = index.search(&vec![0.0; 256], 3, None).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.similarity == 0.0));
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_keep_index_order() {
        let embedder = HashedBagOfWords::new(64);
        let entries = vec![
            faq("a", "refund", None),
            faq("b", "refund", None),
            faq("c", "refund", None),
        ];
        let index = FaqIndex::build(entries, &embedder).unwrap();
        let hits = index.search(&embedder.embed("refund"), 3, None).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let (index, embedder) = build();
        let q = embedder.embed("my refund never arrived");
        assert_eq!(index.search(&q, 3, None).unwrap(), index.search(&q, 3, None).unwrap());
    }

    #[test]
    fn test_dimension_mismatch() {
        let (index, _) = build();
        let err = index.search(&[1.0; 8], 3, None).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch {
                expected: 256,
                actual: 8
            }
        ));
    }

    #[test]
    fn test_build_rejects_empty_and_duplicates() {
        let embedder = HashedBagOfWords::new(32);
        assert!(matches!(
            FaqIndex::build(vec![], &embedder),
            Err(KnowledgeError::EmptyIndex)
        ));

        let entries = vec![faq("x", "refund", None), faq("x", "invoice", None)];
        assert!(matches!(
            FaqIndex::build(entries, &embedder),
            Err(KnowledgeError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_build_rejects_question_without_content() {
        let embedder = HashedBagOfWords::new(32);
        let entries = vec![faq("x", "what is this?", None)];
        assert!(matches!(
            FaqIndex::build(entries, &embedder),
            Err(KnowledgeError::EmptyEmbedding(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("faq_index.json");
        let (index, embedder) = build();
        index.save(&path).unwrap();

        let loaded = FaqIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 256);
        assert_eq!(loaded.embedder(), "hashed-bow-256");

        let q = embedder.embed("update email address");
        assert_eq!(index.search(&q, 3, None).unwrap(), loaded.search(&q, 3, None).unwrap());
    }

    #[test]
    fn test_load_keeps_unit_embeddings_exact() {
        let (index, _) = build();
        let reloaded = FaqIndex::from_artifact(FaqIndexArtifact {
            version: INDEX_FORMAT_VERSION,
            dimension: index.dimension,
            embedder: index.embedder.clone(),
            entries: index.entries.clone(),
            embeddings: index.embeddings.clone(),
        })
        .unwrap();
        assert_eq!(reloaded.embeddings, index.embeddings);
    }

    #[test]
    fn test_load_normalizes_raw_embeddings() {
        let mut entries = sample_entries();
        entries.truncate(2);
        let index = FaqIndex::from_artifact(FaqIndexArtifact {
            version: INDEX_FORMAT_VERSION,
            dimension: 2,
            embedder: String::new(),
            entries,
            embeddings: vec![vec![3.0, 4.0], vec![0.0, 2.0]],
        })
        .unwrap();
        assert_eq!(index.embeddings, vec![vec![0.6, 0.8], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_load_missing() {
        assert!(matches!(
            FaqIndex::load(Path::new("/nonexistent/faq_index.json")),
            Err(KnowledgeError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_load_rejects_inconsistent_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq_index.json");
        let artifact = FaqIndexArtifact {
            version: INDEX_FORMAT_VERSION,
            dimension: 4,
            embedder: String::new(),
            entries: sample_entries(),
            embeddings: vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
        };
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
        assert!(matches!(
            FaqIndex::load(&path),
            Err(KnowledgeError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let artifact = FaqIndexArtifact {
            version: 99,
            dimension: 2,
            embedder: String::new(),
            entries: vec![faq("a", "refund", None)],
            embeddings: vec![vec![1.0, 0.0]],
        };
        assert!(matches!(
            FaqIndex::from_artifact(artifact),
            Err(KnowledgeError::UnsupportedVersion(99))
        ));
    }
}
