//! Observable engine state for operators and supervising tasks.

use crate::index::IndexTopology;
use crate::retrieval::snapshot::{IndexSnapshot, IngestSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    /// Nothing built or loaded yet
    Empty,
    /// First build or load in progress, no index resident
    Building,
    Ready,
    /// Last build or load failed and no index is resident
    Failed,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnginePhase::Empty => "empty",
            EnginePhase::Building => "building",
            EnginePhase::Ready => "ready",
            EnginePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Statistics of a resident index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub num_chunks: usize,
    pub dimension: usize,
    pub topology: IndexTopology,
    /// Whether raw passage vectors are held in memory
    pub vectors_cached: bool,
    /// Summary of the ingest that produced the index, when known
    pub summary: Option<IngestSummary>,
}

impl IndexStatistics {
    pub fn from_snapshot(snapshot: &IndexSnapshot) -> Self {
        Self {
            num_chunks: snapshot.len(),
            dimension: snapshot.dimension(),
            topology: snapshot.topology(),
            vectors_cached: snapshot.vectors().is_some(),
            summary: snapshot.summary().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStatus {
    pub provider: String,
    pub model: String,
    pub normalized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub phase: EnginePhase,
    /// A build or load holds the writer lock right now
    pub busy: bool,
    pub index_dir: PathBuf,
    /// Index and metadata files are present on disk
    pub index_on_disk: bool,
    pub index: Option<IndexStatistics>,
    pub failure: Option<String>,
    pub embedding: EmbeddingStatus,
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        self.phase == EnginePhase::Ready
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Phase: {}{}", self.phase, if self.busy { " (busy)" } else { "" })?;
        writeln!(
            f,
            "Index directory: {} ({})",
            self.index_dir.display(),
            if self.index_on_disk { "index present" } else { "no index" }
        )?;
        writeln!(
            f,
            "Embedding: {} / {} (normalized: {})",
            self.embedding.provider, self.embedding.model, self.embedding.normalized
        )?;
        if let Some(index) = &self.index {
            writeln!(
                f,
                "Resident index: {} chunks, dimension {}, {}",
                index.num_chunks, index.dimension, index.topology
            )?;
            if let Some(summary) = &index.summary {
                writeln!(
                    f,
                    "Built {} from {} files with {}",
                    summary.created_at.to_rfc3339(),
                    summary.num_files,
                    summary.model
                )?;
            }
        }
        if let Some(failure) = &self.failure {
            writeln!(f, "Last failure: {failure}")?;
        }
        Ok(())
    }
}
