//! Batched, order-preserving text encoding on top of an [`EmbeddingProvider`].

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingProvider;
use std::sync::Arc;

/// Result of embedding generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector, 0 when empty
    pub dimension: usize,
}

impl EmbeddingResult {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Splits input into provider-sized batches and stitches the vectors back
/// together in input order, normalizing them when configured to.
#[derive(Clone)]
pub struct Encoder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    normalize: bool,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_name())
            .field("batch_size", &self.batch_size)
            .field("normalize", &self.normalize)
            .finish()
    }
}

impl Encoder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbedConfig) -> Result<Self> {
        Self::with_options(provider, config.batch_size, config.normalize)
    }

    pub fn with_options(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        normalize: bool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "Batch size must be greater than 0",
            ));
        }
        Ok(Self {
            provider,
            batch_size,
            normalize,
        })
    }

    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn ensure_ready(&self) -> Result<()> {
        self.provider.ensure_ready().await
    }

    /// Encodes `texts` into one vector each, preserving order.
    ///
    /// Fails when the provider answers a batch with the wrong number of
    /// vectors or when vector lengths disagree anywhere in the run.
    pub async fn encode(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::default());
        }
        self.provider.ensure_ready().await?;

        let mut embeddings = Vec::with_capacity(texts.len());
        let mut dimension: Option<usize> = None;

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                "Encoding batch {} ({} texts) with {}",
                batch_idx,
                batch.len(),
                self.provider.model_name()
            );
            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EmbedError::shape_mismatch(format!(
                    "provider returned {} vectors for a batch of {}",
                    vectors.len(),
                    batch.len()
                )));
            }

            for mut vector in vectors {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.is_empty() || vector.len() != expected {
                    return Err(EmbedError::shape_mismatch(format!(
                        "expected vectors of length {expected}, got {}",
                        vector.len()
                    )));
                }
                if self.normalize {
                    normalize_l2(&mut vector);
                }
                embeddings.push(vector);
            }
        }

        Ok(EmbeddingResult {
            embeddings,
            dimension: dimension.unwrap_or(0),
        })
    }

    /// Encodes a single query string.
    pub async fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        let result = self.encode(&[query.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::shape_mismatch("no vector produced for query"))
    }
}

/// Scales `vector` to unit L2 norm in place. Zero vectors are left alone.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every batch it sees and answers with `[batch position, text length]`.
    #[derive(Default)]
    struct RecordingProvider {
        batches: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.to_vec());
            let mut out: Vec<Vec<f32>> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| vec![i as f32, t.len() as f32])
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording-model"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let provider = Arc::new(RecordingProvider::default());
        let encoder = Encoder::with_options(provider.clone(), 2, false).unwrap();

        let result = encoder
            .encode(&texts(&["a", "bb", "ccc", "dddd", "eeeee"]))
            .await
            .unwrap();

        let batches = provider.batches.lock().unwrap().clone();
        assert_eq!(
            batches,
            vec![texts(&["a", "bb"]), texts(&["ccc", "dddd"]), texts(&["eeeee"])]
        );
        let lengths: Vec<f32> = result.embeddings.iter().map(|v| v[1]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(result.dimension, 2);
    }

    #[tokio::test]
    async fn test_normalization_gives_unit_vectors() {
        let provider = Arc::new(RecordingProvider::default());
        let encoder = Encoder::with_options(provider, 16, true).unwrap();

        let result = encoder.encode(&texts(&["abc", "x"])).await.unwrap();
        for vector in &result.embeddings {
            let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let encoder = Encoder::with_options(provider.clone(), 4, true).unwrap();

        let result = encoder.encode(&[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.dimension, 0);
        assert!(provider.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_vector_count_is_an_error() {
        let provider = Arc::new(RecordingProvider {
            drop_last: true,
            ..Default::default()
        });
        let encoder = Encoder::with_options(provider, 4, false).unwrap();

        let err = encoder.encode(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, EmbedError::ShapeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_encode_query_returns_single_vector() {
        let provider = Arc::new(RecordingProvider::default());
        let encoder = Encoder::with_options(provider, 4, false).unwrap();

        let vector = encoder.encode_query("fruit").await.unwrap();
        assert_eq!(vector, vec![0.0, 5.0]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let provider = Arc::new(RecordingProvider::default());
        assert!(Encoder::with_options(provider, 0, true).is_err());
    }

    #[test]
    fn test_normalize_l2_leaves_zero_vector() {
        let mut zero = vec![0.0, 0.0];
        normalize_l2(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);

        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.6, 0.8]);
    }
}
