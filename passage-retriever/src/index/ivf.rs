//! Inverted-file index: vectors are bucketed under trained centroids and a
//! query only scans the `nprobe` buckets whose centroids score best.

use super::kmeans::{nearest_centroid, train};
use super::{Hit, Metric, best_k, check_dimensions};
use crate::error::{RagError, Result};

#[derive(Debug, Clone)]
pub struct IvfIndex {
    dimension: usize,
    metric: Metric,
    nprobe: usize,
    centroids: Vec<Vec<f32>>,
    /// Row positions per centroid, ascending within each list.
    lists: Vec<Vec<usize>>,
    /// Row-major storage in insertion order.
    data: Vec<f32>,
}

impl IvfIndex {
    /// Trains `nlist` centroids over `vectors` and assigns every row to one list.
    pub fn train(
        vectors: &[Vec<f32>],
        nlist: usize,
        nprobe: usize,
        metric: Metric,
        iterations: usize,
        seed: u64,
    ) -> Result<Self> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        check_dimensions(vectors, dimension)?;

        tracing::info!(
            "Training IVF index: {} vectors, nlist={}, nprobe={}",
            vectors.len(),
            nlist,
            nprobe
        );
        let centroids = train(vectors, nlist, metric, iterations, seed);
        let mut lists = vec![Vec::new(); centroids.len()];
        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (position, vector) in vectors.iter().enumerate() {
            lists[nearest_centroid(vector, &centroids, metric)].push(position);
            data.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            metric,
            nprobe: nprobe.clamp(1, centroids.len().max(1)),
            centroids,
            lists,
            data,
        })
    }

    /// Reassembles a persisted index, checking that every row sits in exactly one list.
    pub(crate) fn from_parts(
        dimension: usize,
        metric: Metric,
        nprobe: usize,
        centroids: Vec<Vec<f32>>,
        lists: Vec<Vec<usize>>,
        data: Vec<f32>,
    ) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(RagError::corrupt("IVF data is not a whole number of rows"));
        }
        if centroids.len() != lists.len() || centroids.iter().any(|c| c.len() != dimension) {
            return Err(RagError::corrupt("IVF centroids do not match their lists"));
        }
        if nprobe == 0 || nprobe > centroids.len() {
            return Err(RagError::corrupt(format!(
                "IVF nprobe {nprobe} is outside 1..={}",
                centroids.len()
            )));
        }
        let rows = data.len() / dimension;
        let mut seen = vec![false; rows];
        for &position in lists.iter().flatten() {
            match seen.get_mut(position) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(RagError::corrupt(format!(
                        "IVF list entry {position} is out of range or repeated"
                    )));
                }
            }
        }
        if seen.iter().any(|s| !s) {
            return Err(RagError::corrupt("IVF lists do not cover every row"));
        }
        Ok(Self {
            dimension,
            metric,
            nprobe,
            centroids,
            lists,
            data,
        })
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn nlist(&self) -> usize {
        self.centroids.len()
    }

    pub fn nprobe(&self) -> usize {
        self.nprobe
    }

    pub(crate) fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    pub(crate) fn lists(&self) -> &[Vec<usize>] {
        &self.lists
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }
        let probes: Vec<Hit> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(list, centroid)| Hit {
                position: list,
                score: self.metric.score(query, centroid),
            })
            .collect();
        let probes = best_k(probes, self.nprobe, self.metric);

        let hits = probes
            .iter()
            .flat_map(|probe| &self.lists[probe.position])
            .map(|&position| Hit {
                position,
                score: self.metric.score(query, self.row(position)),
            })
            .collect();
        best_k(hits, k, self.metric)
    }
}
