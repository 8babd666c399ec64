//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Loads whatever the provider needs before the first [`embed_batch`](Self::embed_batch).
    ///
    /// Calling this more than once is cheap. Providers with nothing to load keep
    /// the default no-op.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Generate one vector per input text, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Name of the model behind the provider
    fn model_name(&self) -> &str;
}

/// FastEmbed-based embedding provider using local ONNX models.
///
/// The model is loaded on first use, not on construction, so building a
/// provider never touches the network or the disk.
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("loaded", &self.model.initialized())
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a provider after checking that the configured model is one fastembed ships.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<&Arc<Mutex<TextEmbedding>>> {
        self.model.get_or_try_init(|| self.load_model()).await
    }

    async fn load_model(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
        let config = self.config.clone();
        tracing::info!("Loading embedding model: {}", config.model_name);

        if let Some(cache_dir) = &config.cache_dir {
            tokio::fs::create_dir_all(cache_dir).await?;
        }

        let model = tokio::task::spawn_blocking(move || -> Result<TextEmbedding> {
            let mut options = InitOptions::new(config.fastembed_model()?)
                .with_show_download_progress(config.show_download_progress);
            if let Some(cache_dir) = config.cache_dir {
                options = options.with_cache_dir(cache_dir);
            }
            TextEmbedding::try_new(options).map_err(EmbedError::model_init)
        })
        .await??;

        tracing::info!("Embedding model ready: {}", self.config.model_name);
        Ok(Arc::new(Mutex::new(model)))
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn ensure_ready(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(self.model().await?);
        let batch = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model = model.lock().map_err(|_| EmbedError::Poisoned)?;
            model.embed(batch, None).map_err(EmbedError::embedding_gen)
        })
        .await??;

        tracing::debug!("Embedded batch of {} texts", embeddings.len());
        Ok(embeddings)
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
