//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Number of texts handed to a provider per call.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Built-in models that can be selected by name, with their output dimension.
const KNOWN_MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
    ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2, 384),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
    ("nomic-embed-text-v1.5", EmbeddingModel::NomicEmbedTextV15, 768),
];

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Maximum number of texts per provider call
    pub batch_size: usize,
    /// Whether vectors are scaled to unit length after encoding
    pub normalize: bool,
    /// Where downloaded model weights are kept; the library default when unset
    pub cache_dir: Option<PathBuf>,
    /// Show a progress bar while model weights download
    pub show_download_progress: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            normalize: true,
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl EmbedConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model weight cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..self
        }
    }

    pub fn with_download_progress(self, show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
            ..self
        }
    }

    /// Looks up the built-in model matching `model_name`.
    ///
    /// Names are matched case-insensitively and an optional
    /// `sentence-transformers/` or `BAAI/` style organisation prefix is ignored.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel> {
        Self::lookup(&self.model_name).map(|(model, _)| model)
    }

    /// Output dimension of the configured model, when it is a known one.
    pub fn expected_dimension(&self) -> Option<usize> {
        Self::lookup(&self.model_name).ok().map(|(_, dim)| dim)
    }

    fn lookup(name: &str) -> Result<(EmbeddingModel, usize)> {
        let short = name.rsplit('/').next().unwrap_or(name);
        KNOWN_MODELS
            .iter()
            .find(|(known, _, _)| known.eq_ignore_ascii_case(short))
            .map(|(_, model, dim)| (model.clone(), *dim))
            .ok_or_else(|| {
                let names: Vec<_> = KNOWN_MODELS.iter().map(|(n, _, _)| *n).collect();
                EmbedError::invalid_config(format!(
                    "unknown embedding model '{name}', expected one of: {}",
                    names.join(", ")
                ))
            })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "Batch size must be greater than 0",
            ));
        }
        self.fastembed_model()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 16);
        assert!(config.normalize);
        assert!(config.cache_dir.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_dimension(), Some(384));
    }

    #[test]
    fn test_config_builder_methods() {
        let config = EmbedConfig::new("bge-small-en-v1.5")
            .with_batch_size(8)
            .with_normalize(false)
            .with_cache_dir("/tmp/models");

        assert_eq!(config.batch_size, 8);
        assert!(!config.normalize);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/models")));
    }

    #[test]
    fn test_model_lookup_accepts_org_prefix_and_case() {
        let config = EmbedConfig::new("sentence-transformers/All-MiniLM-L6-v2");
        assert!(matches!(
            config.fastembed_model(),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
    }

    #[test]
    fn test_invalid_config() {
        let zero_batch = EmbedConfig::default().with_batch_size(0);
        assert!(matches!(
            zero_batch.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));

        let unknown = EmbedConfig::new("not-a-model");
        let err = unknown.validate().unwrap_err();
        assert!(err.to_string().contains("not-a-model"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EmbedConfig = serde_json::from_str(r#"{"batch_size": 4}"#).unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert!(config.normalize);
    }
}
