//! # passage-embed
//!
//! Text embedding for the passage retrieval core. Local ONNX models run through
//! FastEmbed, loaded lazily on first use. A feature-hashing provider covers
//! offline runs and tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use passage_embed::{EmbedConfig, Encoder, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EmbedConfig::default();
//! let provider = Arc::new(FastEmbedProvider::new(config.clone())?);
//! let encoder = Encoder::new(provider, &config)?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = encoder.encode(&texts).await?;
//! println!("{} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: model selection and batching settings
//! - [`provider`]: the [`EmbeddingProvider`] trait and the FastEmbed backend
//! - [`hashing`]: the weight-free hashing backend
//! - [`encoder`]: batching, shape checks, and normalization over any provider
//! - [`error`]: error types and result handling

pub mod config;
pub mod encoder;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{DEFAULT_BATCH_SIZE, DEFAULT_MODEL_NAME, EmbedConfig};
pub use encoder::{EmbeddingResult, Encoder, normalize_l2};
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use provider::{EmbeddingProvider, FastEmbedProvider};
