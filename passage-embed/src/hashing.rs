//! Feature-hashing embedder that runs without model weights.
//!
//! Every lowercased alphanumeric token is hashed with FNV-1a into one of
//! `dimension` buckets and counted. Two texts that share words end up with a
//! positive dot product, which is enough for offline runs and tests but
//! carries no semantic similarity beyond word overlap.

use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
    model_name: String,
}

impl HashEmbedProvider {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hash embedding dimension must be greater than 0",
            ));
        }
        Ok(Self {
            dimension,
            model_name: format!("feature-hash-{dimension}"),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl Default for HashEmbedProvider {
    fn default() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
            model_name: format!("feature-hash-{}", Self::DEFAULT_DIMENSION),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_case_insensitive() {
        let provider = HashEmbedProvider::new(64).unwrap();
        let vectors = provider
            .embed_batch(&["Apples are FRUIT".to_string(), "apples are fruit".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].len(), 64);
        assert_eq!(vectors[0].iter().sum::<f32>(), 3.0);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let provider = HashEmbedProvider::new(1024).unwrap();
        let vectors = provider
            .embed_batch(&[
                "fruit".to_string(),
                "Bananas are fruit.".to_string(),
                "quantum chromodynamics".to_string(),
            ])
            .await
            .unwrap();
        assert!(dot(&vectors[0], &vectors[1]) >= 1.0);
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn test_empty_text_gives_zero_vector() {
        let provider = HashEmbedProvider::default();
        let vectors = provider.embed_batch(&["  ...  ".to_string()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
        assert_eq!(provider.dimension(), 384);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashEmbedProvider::new(0).is_err());
    }
}
