//! Planner configuration.
//!
//! Layered: built-in defaults -> `<root>/.planner/config.toml` -> `PLANNER_*`
//! environment variables (e.g. `PLANNER_DEFAULT_TOP_K=10`,
//! `PLANNER_EMBEDDING__PROVIDER=disabled`).

use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::paths::PlannerPaths;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic harmonic token projection, no model files.
    Harmonic,
    /// No embeddings: indexing produces no records and search returns nothing.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Harmonic
}

fn default_dimension() -> usize {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Record database, relative to the planner root unless absolute.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".planner/data/recall.db")
}

fn default_top_k() -> usize {
    5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            default_top_k: default_top_k(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn load(paths: &PlannerPaths) -> Result<Self, ConfigError> {
        let config_file = paths.config_file.to_string_lossy().to_string();
        let settings = Config::builder()
            .add_source(File::new(&config_file, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("PLANNER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PlannerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_top_k == 0 {
            return Err(ConfigError::Invalid("default_top_k must be at least 1".into()));
        }
        if self.embedding.dimension == 0 || self.embedding.dimension % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "embedding.dimension must be a positive even number, got {}",
                self.embedding.dimension
            )));
        }
        Ok(())
    }

    pub fn db_path(&self, paths: &PlannerPaths) -> PathBuf {
        paths.resolve(&self.db_path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PlannerPaths::from_root(dir.path().to_path_buf());
        let config = PlannerConfig::load(&paths).unwrap();
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.embedding.provider, ProviderKind::Harmonic);
        assert_eq!(config.embedding.dimension, 512);
        assert_eq!(config.db_path(&paths), paths.default_db_path());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PlannerPaths::from_root(dir.path().to_path_buf());
        std::fs::create_dir_all(&paths.data_dir).unwrap();
        std::fs::write(
            &paths.config_file,
            "default_top_k = 8\n[embedding]\nprovider = \"disabled\"\n",
        )
        .unwrap();

        let config = PlannerConfig::load(&paths).unwrap();
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.embedding.provider, ProviderKind::Disabled);
        assert_eq!(config.embedding.dimension, 512);
    }

    #[test]
    fn test_validate_rejects_odd_dimension() {
        let mut config = PlannerConfig::default();
        config.embedding.dimension = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = PlannerConfig::default().to_toml().unwrap();
        let parsed: PlannerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.default_top_k, 5);
    }
}
