//! Configuration management for retrieve.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default` and missing keys fall back to it.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dataset directory layout
    pub dataset: DatasetConfig,

    /// Processing settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Embedding model settings
    pub embedding: EmbeddingConfig,

    /// Distance and ranking settings
    pub retrieval: RetrievalConfig,

    /// Scoring endpoint settings
    pub submission: SubmissionConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path, or the default location when `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.retrieve.retrieve/config.toml
    /// - Linux: ~/.config/retrieve/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\retrieve\config\config.toml
    ///
    /// Falls back to ~/.retrieve/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "retrieve", "retrieve")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".retrieve").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.general.model_dir)
    }

    /// Get the resolved dataset root (with ~ expansion).
    pub fn data_path(&self) -> PathBuf {
        expand(&self.dataset.data_path)
    }

    /// Output directory for a given model: `<output_dir>/<model>`.
    pub fn output_dir_for(&self, model: ModelKind) -> PathBuf {
        expand(&self.general.output_dir).join(model.dir_name())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.processing.parallel_workers, 4);
        assert_eq!(config.embedding.image_size, 324);
        assert_eq!(config.embedding.channels, 3);
        assert_eq!(config.retrieval.metric, "minkowski");
        assert_eq!(config.retrieval.report_ks, vec![1, 3, 10]);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[dataset]"));
        assert!(toml.contains("[retrieval]"));
        assert!(toml.contains("[submission]"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            model = "pretrained"
            image_size = 224

            [retrieval]
            metric = "cosine"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.model, ModelKind::Pretrained);
        assert_eq!(config.embedding.image_size, 224);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.retrieval.metric, "cosine");
        assert_eq!(config.retrieval.knn_neighbors, 10);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nmetric = \"hamming\"\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("hamming"));
    }

    #[test]
    fn test_output_dir_for_model() {
        let mut config = Config::default();
        config.general.output_dir = PathBuf::from("/tmp/out");
        assert_eq!(
            config.output_dir_for(ModelKind::Triplets),
            PathBuf::from("/tmp/out/triplets_loss")
        );
    }
}
