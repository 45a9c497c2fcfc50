//! Configuration management for concierge
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relevance scorer configuration
    #[serde(default)]
    pub scorer: ScorerConfig,

    /// Reranker configuration
    #[serde(default)]
    pub reranker: RerankerConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query routing configuration
    #[serde(default)]
    pub route: RouteConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieve: RetrieveConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Relevance scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Scorer backend: "lexical" (in-process term overlap) or "http" (embedding sidecar)
    #[serde(default = "default_scorer_backend")]
    pub backend: String,

    /// Embedding backend URL (only used by the "http" backend)
    #[serde(default = "default_scorer_url")]
    pub url: String,

    /// Embedding model identifier (only used by the "http" backend)
    #[serde(default = "default_scorer_model")]
    pub model: String,
}

/// Reranker configuration (cross-encoder pass over retrieved candidates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Enable reranking by default for retrieval calls
    #[serde(default = "default_reranker_enabled")]
    pub enabled: bool,

    /// Reranker backend URL
    #[serde(default = "default_reranker_url")]
    pub url: String,

    /// Model name/identifier for the cross-encoder reranker
    #[serde(default = "default_reranker_model")]
    pub model: String,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk section; longer records split into children
    #[serde(default = "default_section_chars")]
    pub section_chars: usize,

    /// Minimum characters per section (don't create tiny trailing sections)
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,

    /// Priority multiplier applied to user-corrected records (1.5 - 2.0)
    #[serde(default = "default_correction_boost")]
    pub correction_boost: f64,

    /// Retry budget when losing the insert race to a concurrent chunker
    #[serde(default = "default_insert_retries")]
    pub insert_retries: usize,
}

/// Query routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Intent returned when no keyword matches
    #[serde(default = "default_fallback_intent")]
    pub fallback_intent: String,

    /// Saturation constant: confidence = min(score / saturation, 1.0)
    #[serde(default = "default_saturation")]
    pub saturation: f64,

    /// Weight multiplier for tenant-owned keywords over global ones
    #[serde(default = "default_tenant_weight")]
    pub tenant_weight: f64,

    /// Language code assumed for keywords without an explicit one
    #[serde(default = "default_keyword_lang")]
    pub default_lang: String,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveConfig {
    /// Default primary context budget in characters
    #[serde(default = "default_primary_budget")]
    pub primary_budget: usize,

    /// Default secondary context budget in characters
    #[serde(default = "default_secondary_budget")]
    pub secondary_budget: usize,

    /// Minimum relevance score (0.0 - 1.0); 0.0 keeps every candidate
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Per-call timeout in seconds; elapsed calls fail as unavailable
    #[serde(default = "default_retrieve_timeout")]
    pub timeout_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for concierge data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            reranker: RerankerConfig::default(),
            chunk: ChunkConfig::default(),
            route: RouteConfig::default(),
            retrieve: RetrieveConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            backend: default_scorer_backend(),
            url: default_scorer_url(),
            model: default_scorer_model(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: default_reranker_enabled(),
            url: default_reranker_url(),
            model: default_reranker_model(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            section_chars: default_section_chars(),
            min_section_chars: default_min_section_chars(),
            correction_boost: default_correction_boost(),
            insert_retries: default_insert_retries(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            fallback_intent: default_fallback_intent(),
            saturation: default_saturation(),
            tenant_weight: default_tenant_weight(),
            default_lang: default_keyword_lang(),
        }
    }
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            primary_budget: default_primary_budget(),
            secondary_budget: default_secondary_budget(),
            min_score: default_min_score(),
            timeout_secs: default_retrieve_timeout(),
        }
    }
}

impl Config {
    /// Get the default base directory for concierge (~/.concierge)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".concierge")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("knowledge.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("knowledge.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if concierge is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.scorer.backend.as_str() {
            "lexical" | "http" => {}
            other => {
                return Err(Error::Config(format!(
                    "scorer.backend must be 'lexical' or 'http', got '{}'",
                    other
                )));
            }
        }

        if self.chunk.section_chars < self.chunk.min_section_chars {
            return Err(Error::Config(
                "chunk.section_chars must be >= chunk.min_section_chars".to_string(),
            ));
        }

        if !(1.5..=2.0).contains(&self.chunk.correction_boost) {
            return Err(Error::Config(
                "chunk.correction_boost must be between 1.5 and 2.0".to_string(),
            ));
        }

        if self.route.saturation <= 0.0 {
            return Err(Error::Config(
                "route.saturation must be positive".to_string(),
            ));
        }

        if self.route.tenant_weight < 1.0 {
            return Err(Error::Config(
                "route.tenant_weight must be >= 1.0".to_string(),
            ));
        }

        if self.retrieve.min_score < 0.0 || self.retrieve.min_score > 1.0 {
            return Err(Error::Config(
                "retrieve.min_score must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.retrieve.timeout_secs == 0 {
            return Err(Error::Config(
                "retrieve.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scorer.backend, "lexical");
        assert_eq!(config.route.fallback_intent, "general");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.route.fallback_intent = "smalltalk".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.route.fallback_intent, "smalltalk");
        assert_eq!(loaded.paths.db_file, tmp.path().join("knowledge.db"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Invalid: min section larger than max
        config.chunk.min_section_chars = config.chunk.section_chars + 1;
        assert!(config.validate().is_err());
        config.chunk.min_section_chars = default_min_section_chars();
        assert!(config.validate().is_ok());

        // Boost outside the allowed band
        config.chunk.correction_boost = 1.4;
        assert!(config.validate().is_err());
        config.chunk.correction_boost = 2.1;
        assert!(config.validate().is_err());
        config.chunk.correction_boost = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_scorer_backend_rejected() {
        let mut config = Config::default();
        config.scorer.backend = "quantum".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.retrieve.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
