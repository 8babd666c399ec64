//! Ingests a small generated corpus, reloads it in a fresh engine, and prints
//! the context block for a few queries. Uses the hashing embedder, so it runs offline.

use anyhow::Result;
use passage_embed::HashEmbedProvider;
use passage_retriever::{RagConfig, RagEngine};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let docs = tempdir()?;
    std::fs::write(
        docs.path().join("produce.txt"),
        "Apples are fruit. Bananas are fruit. Carrots are vegetables.",
    )?;
    std::fs::write(
        docs.path().join("storage.md"),
        "# Storage\nKeep bananas away from apples.\nCarrots last weeks in the fridge.",
    )?;

    let index_dir = tempdir()?;
    let config = RagConfig::default()
        .with_index_dir(index_dir.path())
        .with_chunking(60, 10);
    let provider = Arc::new(HashEmbedProvider::default());

    let engine = RagEngine::new(config.clone(), provider.clone())?;
    let summary = engine.ingest(docs.path()).await?;
    println!(
        "Indexed {} chunks from {} files ({})",
        summary.num_chunks, summary.num_files, summary.topology
    );

    let reloaded = RagEngine::new(config, provider)?;
    reloaded.load().await?;

    for query in ["Which foods are fruit?", "How long do carrots keep?"] {
        let assembled = reloaded.build_context(query, 3).await?;
        println!("\nQuery: {query}");
        for item in &assembled.items {
            println!("  [{:.3}] {}#{}", item.score, item.source, item.chunk_index);
        }
        println!("Context:\n{}", assembled.context);
    }
    Ok(())
}
