use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DeskmateError, Result};

/// Top-level configuration for Deskmate.
///
/// Loaded from `~/.deskmate/config.toml` by default. The thresholds are tuned
/// empirically, so every cutoff the pipeline uses lives here rather than in
/// code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskmateConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl DeskmateConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DeskmateConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DeskmateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Base directory for model artifacts and logs.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.deskmate".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Intent classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Path to the intent model artifact (JSON). Relative paths resolve
    /// against `general.data_dir`.
    pub model_path: String,
    /// Minimum probability for a label to be reported.
    pub threshold: f32,
    /// Score margin under which the top two labels count as ambiguous.
    pub ambiguity_margin: f32,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            model_path: "models/intent_model.json".to_string(),
            threshold: 0.5,
            ambiguity_margin: 0.3,
        }
    }
}

/// FAQ retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Path to the FAQ index artifact (JSON).
    pub index_path: String,
    /// Number of matches to retrieve per query.
    pub top_k: usize,
    /// Best-match similarity below which a fallback reply is used.
    pub similarity_floor: f32,
    /// Dimension of the bundled hashed bag-of-words embedder.
    pub embedding_dim: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_path: "models/faq_index.json".to_string(),
            top_k: 3,
            similarity_floor: 0.65,
            embedding_dim: 384,
        }
    }
}

/// Multi-turn conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Size of the sliding context window.
    pub context_turns: usize,
    /// Top intent confidence under which a clarifying question is asked.
    pub low_confidence_threshold: f32,
    /// Top score from which clarifying questions name a specific intent.
    pub clarify_hint_floor: f32,
    /// Word count at or under which a query counts as short.
    pub short_query_words: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            context_turns: 5,
            low_confidence_threshold: 0.35,
            clarify_hint_floor: 0.25,
            short_query_words: 5,
        }
    }
}

/// Analytics log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Directory holding the turn log and the failed-query log.
    pub log_dir: String,
    /// Intent confidence under which a turn is added to the failed-query log.
    pub failed_confidence_threshold: f32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            log_dir: "analytics".to_string(),
            failed_confidence_threshold: 0.35,
        }
    }
}
