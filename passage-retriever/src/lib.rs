//! passage-retriever: single-corpus semantic retrieval
//!
//! Turns a folder of documents into a persisted vector index and answers
//! similarity queries with ranked passages and a bounded context block.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: text extraction, index building, and the [`RagEngine`]
//! - **[`index`]**: flat and IVF nearest-neighbour indexes
//! - **[`storage`]**: on-disk index artifacts
//! - **[`status`]**: engine state reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use passage_retriever::{RagConfig, RagEngine};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = RagEngine::with_fastembed(RagConfig::default())?;
//! engine.ingest("docs").await?;
//! let context = engine.build_context("What are apples?", 4).await?;
//! println!("{}", context.context);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → extract → Chunker → Encoder → VectorIndex ─┐
//!                                                      ├─ IndexSnapshot → IndexStore (disk)
//!                         metadata (passages) ─────────┘
//! query → Encoder → IndexSnapshot::search → assemble_context
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod status;
pub mod storage;

pub use config::{ChunkingConfig, IndexConfig, NotReadyPolicy, RagConfig};
pub use error::{RagError, Result, Severity};
pub use index::{IndexTopology, Metric};
pub use retrieval::engine::{EngineState, RagEngine, StartupOutcome};
pub use retrieval::snapshot::{EncoderStamp, IndexSnapshot, IngestSummary};
pub use status::{EnginePhase, EngineStatus, IndexStatistics};
pub use storage::IndexStore;
