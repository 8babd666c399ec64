//! In-memory nearest-neighbour indexes.
//!
//! - `flat`: exact scan over every vector.
//! - `kmeans`: seeded k-means++ trainer used to partition vectors.
//! - `ivf`: inverted-file index that probes the closest partitions only.
//!
//! Positions returned by a search are row numbers in insertion order, which
//! is what ties an index to its metadata table.

pub mod flat;
pub mod ivf;
pub mod kmeans;

use crate::config::IndexConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use flat::FlatIndex;
pub use ivf::IvfIndex;

/// Similarity measure shared by an index and the queries run against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Dot product; higher is better. Equals cosine on unit vectors.
    InnerProduct,
    /// Squared euclidean distance; lower is better.
    L2,
}

impl Metric {
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }

    /// Orders scores best-first.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self {
            Metric::InnerProduct => ord.reverse(),
            Metric::L2 => ord,
        }
    }

    pub(crate) fn to_tag(self) -> u8 {
        match self {
            Metric::InnerProduct => 0,
            Metric::L2 => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Metric::InnerProduct),
            1 => Ok(Metric::L2),
            other => Err(RagError::corrupt(format!("unknown metric tag {other}"))),
        }
    }
}

/// A search result: row position in the index plus its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub score: f32,
}

/// Keeps the best `k` hits. The sort is stable, so ties keep scan order.
pub(crate) fn best_k(mut hits: Vec<Hit>, k: usize, metric: Metric) -> Vec<Hit> {
    hits.sort_by(|a, b| metric.rank(a.score, b.score));
    hits.truncate(k);
    hits
}

/// Index layout, chosen once per build from the corpus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexTopology {
    Flat,
    Ivf { nlist: usize, nprobe: usize },
}

impl IndexTopology {
    pub fn for_corpus(num_vectors: usize, config: &IndexConfig) -> Self {
        if num_vectors < config.ivf_threshold {
            return IndexTopology::Flat;
        }
        let nlist = config
            .ivf_nlist
            .min(config.min_nlist.max(num_vectors / 16))
            .min(num_vectors)
            .max(1);
        let nprobe = config
            .nprobe
            .unwrap_or_else(|| config.min_nprobe.max(nlist / 10))
            .clamp(1, nlist);
        IndexTopology::Ivf { nlist, nprobe }
    }
}

impl std::fmt::Display for IndexTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexTopology::Flat => write!(f, "flat"),
            IndexTopology::Ivf { nlist, nprobe } => {
                write!(f, "ivf(nlist={nlist}, nprobe={nprobe})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum VectorIndex {
    Flat(FlatIndex),
    Ivf(IvfIndex),
}

impl VectorIndex {
    /// Builds an index of the given topology over `vectors`, rows in order.
    pub fn build(
        topology: IndexTopology,
        metric: Metric,
        vectors: &[Vec<f32>],
        config: &IndexConfig,
    ) -> Result<Self> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        match topology {
            IndexTopology::Flat => {
                let mut index = FlatIndex::new(dimension, metric);
                index.add(vectors)?;
                Ok(VectorIndex::Flat(index))
            }
            IndexTopology::Ivf { nlist, nprobe } => Ok(VectorIndex::Ivf(IvfIndex::train(
                vectors,
                nlist,
                nprobe,
                metric,
                config.kmeans_iterations,
                config.kmeans_seed,
            )?)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorIndex::Flat(index) => index.len(),
            VectorIndex::Ivf(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        match self {
            VectorIndex::Flat(index) => index.dimension(),
            VectorIndex::Ivf(index) => index.dimension(),
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            VectorIndex::Flat(index) => index.metric(),
            VectorIndex::Ivf(index) => index.metric(),
        }
    }

    pub fn topology(&self) -> IndexTopology {
        match self {
            VectorIndex::Flat(_) => IndexTopology::Flat,
            VectorIndex::Ivf(index) => IndexTopology::Ivf {
                nlist: index.nlist(),
                nprobe: index.nprobe(),
            },
        }
    }

    /// Best-first hits for `query`. The caller checks the dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        match self {
            VectorIndex::Flat(index) => index.search(query, k),
            VectorIndex::Ivf(index) => index.search(query, k),
        }
    }
}

pub(crate) fn check_dimensions(vectors: &[Vec<f32>], dimension: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != dimension) {
        Some(v) => Err(RagError::DimensionMismatch {
            expected: dimension,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}
