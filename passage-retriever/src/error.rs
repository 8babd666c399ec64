//! Error taxonomy for ingest, load and retrieval.

use passage_embed::EmbedError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No supported documents (.txt, .md, .csv, .pdf) in {}", .0.display())]
    NoInput(PathBuf),

    #[error("Documents in {} produced no passages", .0.display())]
    EmptyCorpus(PathBuf),

    /// An index build or load is in progress and no index is resident yet
    #[error("Index is not ready; a build or load is in progress")]
    NotReady,

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Index holds {index} vectors but metadata holds {metadata} passages")]
    AlignmentViolation { index: usize, metadata: usize },

    #[error("Query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted index was embedded differently from how queries are
    #[error("Index was built with {index}, but queries are encoded with {encoder}")]
    EncoderMismatch { index: String, encoder: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Retry later.
    Transient,
    /// Needs operator action such as adding documents or fixing configuration.
    Operator,
    /// Persisted or in-memory state disagrees with itself.
    Consistency,
    Failure,
}

impl RagError {
    pub fn severity(&self) -> Severity {
        match self {
            RagError::NotReady => Severity::Transient,
            RagError::NotFound(_)
            | RagError::NoInput(_)
            | RagError::EmptyCorpus(_)
            | RagError::InvalidConfig(_) => Severity::Operator,
            RagError::IndexCorrupt(_)
            | RagError::AlignmentViolation { .. }
            | RagError::DimensionMismatch { .. }
            | RagError::EncoderMismatch { .. } => Severity::Consistency,
            RagError::Embedding(_)
            | RagError::Io(_)
            | RagError::Serialization(_)
            | RagError::Encode(_)
            | RagError::Task(_) => Severity::Failure,
        }
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        RagError::IndexCorrupt(message.into())
    }
}
