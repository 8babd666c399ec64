//! The immutable unit the engine publishes: an index plus the metadata table
//! whose rows it indexes.

use crate::error::{RagError, Result};
use crate::index::{IndexTopology, VectorIndex};
use crate::storage::format::Fingerprint;
use chrono::{DateTime, Utc};
use passage_context::{Passage, RetrievedItem};
use passage_embed::Encoder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The encoder settings an index was built with. Queries must be encoded the
/// same way for scores against the index to mean anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderStamp {
    pub model: String,
    pub normalized: bool,
}

impl EncoderStamp {
    pub fn of(encoder: &Encoder) -> Self {
        Self {
            model: encoder.model_name().to_string(),
            normalized: encoder.normalizes(),
        }
    }
}

impl fmt::Display for EncoderStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vectors = if self.normalized { "normalized" } else { "raw" };
        write!(f, "{} ({vectors} vectors)", self.model)
    }
}

/// Facts about one ingest run, persisted as `chunk_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub num_chunks: usize,
    pub num_files: usize,
    pub dimension: usize,
    pub topology: IndexTopology,
    pub model: String,
    pub normalized: bool,
    pub created_at: DateTime<Utc>,
    /// Hex blake3 hash of the metadata table
    pub fingerprint: String,
}

/// blake3 over the compact JSON encoding of `metadata`.
pub fn metadata_fingerprint(metadata: &[Passage]) -> Result<Fingerprint> {
    let bytes = serde_json::to_vec(metadata)?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

pub fn fingerprint_hex(fingerprint: &Fingerprint) -> String {
    blake3::Hash::from_bytes(*fingerprint).to_hex().to_string()
}

/// Row `i` of `index` corresponds to `metadata[i]`; construction enforces
/// equal lengths and nothing mutates either side afterwards.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    index: VectorIndex,
    metadata: Vec<Passage>,
    encoder: EncoderStamp,
    vectors: Option<Vec<Vec<f32>>>,
    summary: Option<IngestSummary>,
}

impl IndexSnapshot {
    pub fn new(index: VectorIndex, metadata: Vec<Passage>, encoder: EncoderStamp) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(RagError::AlignmentViolation {
                index: index.len(),
                metadata: metadata.len(),
            });
        }
        Ok(Self {
            index,
            metadata,
            encoder,
            vectors: None,
            summary: None,
        })
    }

    pub fn with_vectors(self, vectors: Option<Vec<Vec<f32>>>) -> Self {
        Self { vectors, ..self }
    }

    pub fn with_summary(self, summary: Option<IngestSummary>) -> Self {
        Self { summary, ..self }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metadata(&self) -> &[Passage] {
        &self.metadata
    }

    pub fn encoder(&self) -> &EncoderStamp {
        &self.encoder
    }

    /// Raw passage vectors, present after an ingest or when the cache file loaded.
    pub fn vectors(&self) -> Option<&[Vec<f32>]> {
        self.vectors.as_deref()
    }

    pub fn summary(&self) -> Option<&IngestSummary> {
        self.summary.as_ref()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn topology(&self) -> IndexTopology {
        self.index.topology()
    }

    /// Ranks passages against an already encoded query, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedItem>> {
        if query.len() != self.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let items = self
            .index
            .search(query, top_k)
            .into_iter()
            .filter_map(|hit| match self.metadata.get(hit.position) {
                Some(passage) => Some(RetrievedItem::from_passage(passage, hit.score)),
                None => {
                    tracing::warn!(
                        "Dropping out-of-range index position {} (metadata has {} rows)",
                        hit.position,
                        self.metadata.len()
                    );
                    None
                }
            })
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::Metric;

    fn passages(n: usize) -> Vec<Passage> {
        (0..n)
            .map(|i| Passage::new("notes.txt", i, format!("passage {i}"), 400))
            .collect()
    }

    fn stamp() -> EncoderStamp {
        EncoderStamp {
            model: "feature-hash-2".into(),
            normalized: true,
        }
    }

    fn flat(vectors: &[Vec<f32>]) -> VectorIndex {
        VectorIndex::build(
            IndexTopology::Flat,
            Metric::InnerProduct,
            vectors,
            &IndexConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_alignment_enforced() {
        let index = flat(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let err = IndexSnapshot::new(index, passages(3), stamp()).unwrap_err();
        assert!(matches!(
            err,
            RagError::AlignmentViolation {
                index: 2,
                metadata: 3
            }
        ));
    }

    #[test]
    fn test_search_maps_positions_to_passages() {
        let index = flat(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]]);
        let snapshot = IndexSnapshot::new(index, passages(3), stamp()).unwrap();

        let items = snapshot.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].chunk_index, 1);
        assert_eq!(items[0].snippet, "passage 1");
        assert_eq!(items[1].chunk_index, 2);
        assert!(items[0].score >= items[1].score);
    }

    #[test]
    fn test_dimension_mismatch() {
        let snapshot = IndexSnapshot::new(flat(&[vec![1.0, 0.0]]), passages(1), stamp()).unwrap();
        let err = snapshot.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_fingerprint_tracks_metadata() {
        let a = metadata_fingerprint(&passages(2)).unwrap();
        let b = metadata_fingerprint(&passages(2)).unwrap();
        let c = metadata_fingerprint(&passages(3)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(fingerprint_hex(&a).len(), 64);
    }

    #[test]
    fn test_encoder_stamp_display() {
        assert_eq!(stamp().to_string(), "feature-hash-2 (normalized vectors)");
        let raw = EncoderStamp {
            normalized: false,
            ..stamp()
        };
        assert_eq!(raw.to_string(), "feature-hash-2 (raw vectors)");
        assert_ne!(raw, stamp());
    }
}
