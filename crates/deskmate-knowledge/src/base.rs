//! FAQ lookup on top of [`FaqIndex`]: intent filtering with fallback,
//! confidence bands and corpus statistics.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use deskmate_core::types::{FaqEntry, IntentLabel};

use crate::error::KnowledgeError;
use crate::index::FaqIndex;

/// Coarse quality of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// High above 0.7, medium above 0.5, low otherwise.
    pub fn from_similarity(similarity: f32) -> Self {
        if similarity > 0.7 {
            ConfidenceBand::High
        } else if similarity > 0.5 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBand::High => write!(f, "high"),
            ConfidenceBand::Medium => write!(f, "medium"),
            ConfidenceBand::Low => write!(f, "low"),
        }
    }
}

/// A retrieved FAQ entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    pub similarity: f32,
    pub band: ConfidenceBand,
    /// 1-based rank within the result list.
    pub rank: usize,
}

/// Entry counts for `deskmate stats` and startup logging.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub entries: usize,
    pub dimension: usize,
    pub embedder: String,
    pub by_category: BTreeMap<String, usize>,
    pub by_intent: BTreeMap<String, usize>,
}

/// Static FAQ knowledge base.
pub struct KnowledgeBase {
    index: FaqIndex,
}

impl KnowledgeBase {
    pub fn new(index: FaqIndex) -> Self {
        Self { index }
    }

    /// Load the index artifact at `path`.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        Ok(Self::new(FaqIndex::load(path)?))
    }

    pub fn index(&self) -> &FaqIndex {
        &self.index
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Top-`k` matches for `embedding`, best first, optionally restricted to
    /// entries tagged with `intent`.
    pub fn search(
        &self,
        embedding: &[f32],
        k: usize,
        intent: Option<IntentLabel>,
    ) -> Result<Vec<FaqMatch>, KnowledgeError> {
        let hits = self.index.search(embedding, k, intent)?;
        Ok(hits
            .into_iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                let entry = self.index.entry(hit.position)?.clone();
                Some(FaqMatch {
                    entry,
                    similarity: hit.similarity,
                    band: ConfidenceBand::from_similarity(hit.similarity),
                    rank: i + 1,
                })
            })
            .collect())
    }

    /// Search within `primary` first; if no entry carries that intent, search
    /// the whole index instead.
    pub fn lookup(
        &self,
        embedding: &[f32],
        k: usize,
        primary: Option<IntentLabel>,
    ) -> Result<Vec<FaqMatch>, KnowledgeError> {
        if let Some(intent) = primary {
            let filtered = self.search(embedding, k, Some(intent))?;
            if !filtered.is_empty() {
                return Ok(filtered);
            }
            debug!(intent = %intent, "No FAQ entries for intent, searching all");
        }
        self.search(embedding, k, None)
    }

    pub fn stats(&self) -> KnowledgeStats {
        let mut by_category = BTreeMap::new();
        let mut by_intent = BTreeMap::new();
        for entry in self.index.entries() {
            let category = if entry.category.is_empty() {
                "uncategorized".to_string()
            } else {
                entry.category.clone()
            };
            *by_category.entry(category).or_insert(0) += 1;
            let intent = entry
                .intent
                .map(|i| i.to_string())
                .unwrap_or_else(|| "untagged".to_string());
            *by_intent.entry(intent).or_insert(0) += 1;
        }
        KnowledgeStats {
            entries: self.index.len(),
            dimension: self.index.dimension(),
            embedder: self.index.embedder().to_string(),
            by_category,
            by_intent,
        }
    }
}

/// FAQ source record. `id` and `intent` are optional in source files.
#[derive(Debug, Deserialize)]
struct FaqSourceEntry {
    #[serde(default)]
    id: Option<String>,
    question: String,
    answer: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    intent: Option<IntentLabel>,
}

/// Read FAQ entries from a JSON list.
///
/// Missing ids become `faq-NNN` (1-based position). A missing intent is
/// taken from the category when the category names an intent.
pub fn load_faq_source(path: &Path) -> Result<Vec<FaqEntry>, KnowledgeError> {
    let content = std::fs::read_to_string(path)?;
    let raw: Vec<FaqSourceEntry> = serde_json::from_str(&content)
        .map_err(|e| KnowledgeError::InvalidSource(format!("{}: {}", path.display(), e)))?;

    let mut ids = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());
    for (i, item) in raw.into_iter().enumerate() {
        if item.question.trim().is_empty() || item.answer.trim().is_empty() {
            return Err(KnowledgeError::InvalidSource(format!(
                "entry {} has an empty question or answer",
                i + 1
            )));
        }
        let id = item.id.unwrap_or_else(|| format!("faq-{:03}", i + 1));
        if !ids.insert(id.clone()) {
            return Err(KnowledgeError::DuplicateId(id));
        }
        let intent = item.intent.or_else(|| item.category.parse().ok());
        entries.push(FaqEntry {
            id,
            question: item.question,
            answer: item.answer,
            category: item.category,
            intent,
        });
    }

    info!(path = %path.display(), entries = entries.len(), "FAQ source loaded");
    Ok(entries)
}
