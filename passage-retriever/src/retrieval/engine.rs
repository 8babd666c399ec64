//! The retrieval engine: owns the published index snapshot and serializes
//! builds and loads against each other.
//!
//! State moves `Empty → Building → Ready`, or to `Failed` when the first
//! build or load goes wrong. Once ready, a rebuild is assembled off to the
//! side and swapped in with a single assignment, so readers always see an
//! index together with the metadata it was built from.

use super::builder::IndexBuilder;
use super::snapshot::{EncoderStamp, IndexSnapshot, IngestSummary};
use crate::config::{MAX_TOP_K, NotReadyPolicy, RagConfig};
use crate::error::{RagError, Result};
use crate::status::{EmbeddingStatus, EnginePhase, EngineStatus, IndexStatistics};
use crate::storage::IndexStore;
use passage_context::{AssembledContext, RetrievedItem, assemble_context};
use passage_embed::{EmbeddingProvider, Encoder, FastEmbedProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
pub enum EngineState {
    #[default]
    Empty,
    Building,
    Ready(Arc<IndexSnapshot>),
    Failed(String),
}

/// How a supervised startup obtained its index.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupOutcome {
    Loaded(IndexStatistics),
    Built(IngestSummary),
}

#[derive(Debug)]
pub struct RagEngine {
    config: RagConfig,
    encoder: Encoder,
    builder: IndexBuilder,
    store: IndexStore,
    state: RwLock<EngineState>,
    /// Held for the whole of an ingest or load.
    writer: Mutex<()>,
}

impl RagEngine {
    pub fn new(config: RagConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let encoder = Encoder::new(provider, &config.embedding)?;
        let builder = IndexBuilder::new(config.clone(), encoder.clone())?;
        let store = IndexStore::new(&config.index_dir);
        Ok(Self {
            config,
            encoder,
            builder,
            store,
            state: RwLock::new(EngineState::Empty),
            writer: Mutex::new(()),
        })
    }

    /// Engine backed by the local ONNX model named in `config.embedding`.
    pub fn with_fastembed(config: RagConfig) -> Result<Self> {
        let provider = FastEmbedProvider::new(config.embedding.clone())?;
        Self::new(config, Arc::new(provider))
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// The published snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        match &*self.state.read().await {
            EngineState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.snapshot().await.is_some()
    }

    /// Builds an index from `folder`, persists it, then publishes it.
    ///
    /// A ready engine keeps answering queries from its current snapshot until
    /// the new one is published. If the build fails the current snapshot stays.
    pub async fn ingest(&self, folder: impl AsRef<Path>) -> Result<IngestSummary> {
        let folder = folder.as_ref();
        let _writer = self.writer.lock().await;
        self.begin_work().await;

        match self.ingest_locked(folder).await {
            Ok((snapshot, summary)) => {
                self.publish(snapshot).await;
                info!(
                    "Ingest complete: {} chunks from {} files ({})",
                    summary.num_chunks, summary.num_files, summary.topology
                );
                Ok(summary)
            }
            Err(e) => {
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn ingest_locked(&self, folder: &Path) -> Result<(Arc<IndexSnapshot>, IngestSummary)> {
        let (snapshot, summary) = self.builder.build_snapshot(folder).await?;
        let snapshot = Arc::new(snapshot);

        let store = self.store.clone();
        let to_save = Arc::clone(&snapshot);
        tokio::task::spawn_blocking(move || store.save(&to_save)).await??;
        Ok((snapshot, summary))
    }

    /// Restores the persisted index and publishes it.
    pub async fn load(&self) -> Result<IndexStatistics> {
        let _writer = self.writer.lock().await;
        let snapshot = self.load_locked().await?;
        Ok(IndexStatistics::from_snapshot(&snapshot))
    }

    /// Caller holds the writer lock. The loaded index is only published when
    /// it was embedded the same way this engine encodes queries.
    async fn load_locked(&self) -> Result<Arc<IndexSnapshot>> {
        self.begin_work().await;
        let store = self.store.clone();
        let loaded = match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(result) => result,
            Err(e) => Err(RagError::from(e)),
        }
        .and_then(|snapshot| {
            self.check_encoder(&snapshot)?;
            Ok(snapshot)
        });

        match loaded {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.publish(Arc::clone(&snapshot)).await;
                Ok(snapshot)
            }
            Err(e) => {
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    fn check_encoder(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let expected = EncoderStamp::of(&self.encoder);
        if snapshot.encoder() != &expected {
            return Err(RagError::EncoderMismatch {
                index: snapshot.encoder().to_string(),
                encoder: expected.to_string(),
            });
        }
        Ok(())
    }

    async fn begin_work(&self) {
        let mut state = self.state.write().await;
        if !matches!(*state, EngineState::Ready(_)) {
            *state = EngineState::Building;
        }
    }

    async fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        *self.state.write().await = EngineState::Ready(snapshot);
    }

    async fn record_failure(&self, err: &RagError) {
        let mut state = self.state.write().await;
        if matches!(*state, EngineState::Ready(_)) {
            warn!("Keeping the current index after a failed rebuild: {}", err);
        } else {
            *state = EngineState::Failed(err.to_string());
        }
    }

    /// Returns the resident snapshot, loading it from disk first when none is
    /// published. Never waits for a build or load that is already running.
    async fn resident_snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot);
        }
        let Ok(_writer) = self.writer.try_lock() else {
            debug!("Index requested while a build or load is running");
            return Err(RagError::NotReady);
        };
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot);
        }
        info!("No resident index, loading from {}", self.store.dir().display());
        self.load_locked().await
    }

    /// Ranks passages against `query`, best first. `top_k` is clamped to `1..=10`.
    ///
    /// A blank query returns nothing without touching the encoder or the index.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let snapshot = self.resident_snapshot().await?;
        let top_k = top_k.clamp(1, MAX_TOP_K);

        let query_vector = self.encoder.encode_query(query).await?;
        let items = snapshot.search(&query_vector, top_k)?;
        debug!("Query returned {} of top {} results", items.len(), top_k);
        Ok(items)
    }

    /// Searches and assembles the bounded context block.
    ///
    /// With `not_ready = "empty-context"` an index that is still being built
    /// yields an empty context instead of [`RagError::NotReady`].
    pub async fn build_context(&self, query: &str, top_k: usize) -> Result<AssembledContext> {
        match self.search(query, top_k).await {
            Ok(items) => Ok(assemble_context(items, self.config.max_context_chars)),
            Err(RagError::NotReady) if self.config.not_ready == NotReadyPolicy::EmptyContext => {
                debug!("Index not ready, returning empty context");
                Ok(AssembledContext::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn status(&self) -> EngineStatus {
        let busy = self.writer.try_lock().is_err();
        let (phase, index, failure) = match &*self.state.read().await {
            EngineState::Empty => (EnginePhase::Empty, None, None),
            EngineState::Building => (EnginePhase::Building, None, None),
            EngineState::Ready(snapshot) => (
                EnginePhase::Ready,
                Some(IndexStatistics::from_snapshot(snapshot)),
                None,
            ),
            EngineState::Failed(reason) => (EnginePhase::Failed, None, Some(reason.clone())),
        };

        EngineStatus {
            phase,
            busy,
            index_dir: self.store.dir().to_path_buf(),
            index_on_disk: self.store.exists(),
            index,
            failure,
            embedding: EmbeddingStatus {
                provider: self.encoder.provider_name().to_string(),
                model: self.encoder.model_name().to_string(),
                normalized: self.encoder.normalizes(),
            },
        }
    }

    /// Loads the persisted index, or ingests `folder` when there is none.
    pub async fn startup(&self, folder: &Path) -> Result<StartupOutcome> {
        match self.load().await {
            Ok(statistics) => Ok(StartupOutcome::Loaded(statistics)),
            Err(RagError::NotFound(_)) => {
                info!(
                    "No persisted index in {}, building from {}",
                    self.store.dir().display(),
                    folder.display()
                );
                self.ingest(folder).await.map(StartupOutcome::Built)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs [`startup`](Self::startup) as a background task. Progress is
    /// visible through [`status`](Self::status) and the outcome through the handle.
    pub fn spawn_startup(
        self: &Arc<Self>,
        folder: impl Into<PathBuf>,
    ) -> JoinHandle<Result<StartupOutcome>> {
        let engine = Arc::clone(self);
        let folder = folder.into();
        tokio::spawn(async move {
            let outcome = engine.startup(&folder).await;
            match &outcome {
                Ok(StartupOutcome::Loaded(stats)) => {
                    info!("Startup loaded index with {} chunks", stats.num_chunks)
                }
                Ok(StartupOutcome::Built(summary)) => {
                    info!("Startup built index with {} chunks", summary.num_chunks)
                }
                Err(e) => error!("Startup failed: {}", e),
            }
            outcome
        })
    }
}
