//! Encodes a few sentences with the default local model and prints their similarities.

use passage_embed::{EmbedConfig, Encoder, FastEmbedProvider};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cache = tempfile::tempdir()?;
    let config = EmbedConfig::default()
        .with_batch_size(2)
        .with_cache_dir(cache.path());

    println!("Model: {}", config.model_name);
    println!("Batch size: {}", config.batch_size);

    let provider = Arc::new(FastEmbedProvider::new(config.clone())?);
    let encoder = Encoder::new(provider, &config)?;

    let texts = vec![
        "Rust is a systems programming language.".to_string(),
        "FastEmbed provides fast embedding generation.".to_string(),
        "Machine learning models process natural language.".to_string(),
    ];
    let result = encoder.encode(&texts).await?;
    println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);

    let query = encoder.encode_query("Which language is used for systems work?").await?;
    for (text, embedding) in texts.iter().zip(&result.embeddings) {
        let score: f32 = query.iter().zip(embedding).map(|(a, b)| a * b).sum();
        println!("{score:.3}  {text}");
    }
    Ok(())
}
