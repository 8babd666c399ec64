//! TOML-backed configuration for the retrieval engine.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Sections mirror the pipeline stages: `[chunking]`,
//! `[embedding]` and `[index]`.

use crate::error::{RagError, Result};
use passage_context::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SNIPPET_CHARS};
use passage_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_DIR: &str = ".passage-index";
pub const DEFAULT_TOP_K: usize = 4;
/// Upper bound applied to every requested `top_k`.
pub const MAX_TOP_K: usize = 10;

/// What `build_context` does when no index is resident and one is being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotReadyPolicy {
    /// Return [`RagError::NotReady`].
    #[default]
    Fail,
    /// Return an empty context block.
    EmptyContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub snippet_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Index topology and IVF training parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Corpora with at least this many passages get an IVF index.
    pub ivf_threshold: usize,
    pub ivf_nlist: usize,
    pub min_nlist: usize,
    pub min_nprobe: usize,
    /// Fixed probe count; derived from `nlist` when unset.
    pub nprobe: Option<usize>,
    pub kmeans_iterations: usize,
    pub kmeans_seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ivf_threshold: 5000,
            ivf_nlist: 256,
            min_nlist: 64,
            min_nprobe: 4,
            nprobe: None,
            kmeans_iterations: 10,
            kmeans_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Directory holding the persisted index artifacts
    pub index_dir: PathBuf,
    /// Character budget of an assembled context block
    pub max_context_chars: usize,
    pub default_top_k: usize,
    pub not_ready: NotReadyPolicy,
    pub chunking: ChunkingConfig,
    pub embedding: EmbedConfig,
    pub index: IndexConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            max_context_chars: passage_context::DEFAULT_MAX_CONTEXT_CHARS,
            default_top_k: DEFAULT_TOP_K,
            not_ready: NotReadyPolicy::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbedConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl RagConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RagError::NotFound(path.to_path_buf()),
            _ => RagError::Io(e),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(content)
            .map_err(|e| RagError::InvalidConfig(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_index_dir<P: AsRef<Path>>(self, index_dir: P) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    pub fn with_chunking(self, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_size,
                chunk_overlap,
                ..self.chunking
            },
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunking.chunk_size must be greater than 0".into(),
            ));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if chunking.snippet_chars == 0 {
            return Err(RagError::InvalidConfig(
                "chunking.snippet_chars must be greater than 0".into(),
            ));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::InvalidConfig(
                "max_context_chars must be greater than 0".into(),
            ));
        }
        if !(1..=MAX_TOP_K).contains(&self.default_top_k) {
            return Err(RagError::InvalidConfig(format!(
                "default_top_k must be between 1 and {MAX_TOP_K}"
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::InvalidConfig(
                "embedding.batch_size must be greater than 0".into(),
            ));
        }

        let index = &self.index;
        if index.ivf_threshold == 0 || index.ivf_nlist == 0 || index.min_nlist == 0 {
            return Err(RagError::InvalidConfig(
                "index.ivf_threshold, ivf_nlist and min_nlist must be greater than 0".into(),
            ));
        }
        if index.min_nprobe == 0 || index.nprobe == Some(0) {
            return Err(RagError::InvalidConfig(
                "index probe counts must be greater than 0".into(),
            ));
        }
        if index.kmeans_iterations == 0 {
            return Err(RagError::InvalidConfig(
                "index.kmeans_iterations must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
