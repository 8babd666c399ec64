//! Exact nearest-neighbour search by scanning every row.

use super::{Hit, Metric, best_k, check_dimensions};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    /// Row-major storage, `dimension` floats per row.
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            data: Vec::new(),
        }
    }

    pub(crate) fn from_raw(dimension: usize, metric: Metric, data: Vec<f32>) -> Self {
        Self {
            dimension,
            metric,
            data,
        }
    }

    /// Appends rows after the existing ones.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        check_dimensions(vectors, self.dimension)?;
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
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

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        if self.dimension == 0 || k == 0 {
            return Vec::new();
        }
        let hits = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Hit {
                position,
                score: self.metric.score(query, row),
            })
            .collect();
        best_k(hits, k, self.metric)
    }
}
