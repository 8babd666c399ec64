//! Seeded k-means++ used to train IVF partitions.
//!
//! Training is fully deterministic for a given seed and input order, so
//! rebuilding the same corpus yields the same centroids.

use super::Metric;

/// SplitMix64 generator. Small, fast and reproducible across platforms.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn next_index(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    Metric::L2.score(a, b)
}

/// Index of the centroid `vector` belongs to under `metric`.
pub fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>], metric: Metric) -> usize {
    let mut best = 0;
    let mut best_score = f32::NAN;
    for (i, centroid) in centroids.iter().enumerate() {
        let score = metric.score(vector, centroid);
        if best_score.is_nan() || metric.rank(score, best_score).is_lt() {
            best = i;
            best_score = score;
        }
    }
    best
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

/// k-means++ seeding: the first centre is uniform, each further centre is
/// drawn with probability proportional to its squared distance from the
/// closest centre chosen so far.
fn seed_centroids(data: &[Vec<f32>], k: usize, rng: &mut SplitMix64) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.next_index(data.len())].clone());

    let mut closest: Vec<f32> = data
        .iter()
        .map(|v| squared_distance(v, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().map(|d| *d as f64).sum();
        let pick = if total > 0.0 {
            let target = rng.next_f64() * total;
            let mut acc = 0.0f64;
            closest
                .iter()
                .position(|d| {
                    acc += *d as f64;
                    acc > target
                })
                .unwrap_or(data.len() - 1)
        } else {
            // every point coincides with a centre already
            rng.next_index(data.len())
        };

        let centroid = data[pick].clone();
        for (dist, vector) in closest.iter_mut().zip(data) {
            *dist = dist.min(squared_distance(vector, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Trains `k` centroids over `data` (capped at the number of vectors).
///
/// Under [`Metric::InnerProduct`] centroids are re-normalized every round.
/// A cluster that loses all its members keeps its previous centroid.
pub fn train(
    data: &[Vec<f32>],
    k: usize,
    metric: Metric,
    iterations: usize,
    seed: u64,
) -> Vec<Vec<f32>> {
    if data.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(data.len());
    let dimension = data[0].len();
    let mut rng = SplitMix64::new(seed);
    let mut centroids = seed_centroids(data, k, &mut rng);
    if metric == Metric::InnerProduct {
        centroids.iter_mut().for_each(|c| normalize(c));
    }

    for round in 0..iterations {
        let mut sums = vec![vec![0.0f32; dimension]; k];
        let mut counts = vec![0usize; k];
        for vector in data {
            let cluster = nearest_centroid(vector, &centroids, metric);
            counts[cluster] += 1;
            for (sum, v) in sums[cluster].iter_mut().zip(vector) {
                *sum += v;
            }
        }

        let mut moved = false;
        for ((centroid, mut sum), count) in centroids.iter_mut().zip(sums).zip(&counts) {
            if *count == 0 {
                continue;
            }
            sum.iter_mut().for_each(|s| *s /= *count as f32);
            if metric == Metric::InnerProduct {
                normalize(&mut sum);
            }
            if *centroid != sum {
                moved = true;
                *centroid = sum;
            }
        }
        tracing::debug!(
            "k-means round {} of {}: {} empty clusters",
            round + 1,
            iterations,
            counts.iter().filter(|c| **c == 0).count()
        );
        if !moved {
            break;
        }
    }
    centroids
}
