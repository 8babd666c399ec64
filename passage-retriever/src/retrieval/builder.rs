//! Builds a complete [`IndexSnapshot`] from a folder of documents.

use super::extract::{collect_supported_files, extract_text};
use super::snapshot::{
    EncoderStamp, IndexSnapshot, IngestSummary, fingerprint_hex, metadata_fingerprint,
};
use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::index::{IndexTopology, Metric, VectorIndex};
use chrono::Utc;
use passage_context::{Chunker, Passage};
use passage_embed::Encoder;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract → chunk → encode → index, producing state that has not been
/// published or persisted.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: RagConfig,
    chunker: Chunker,
    encoder: Encoder,
}

impl IndexBuilder {
    pub fn new(config: RagConfig, encoder: Encoder) -> Result<Self> {
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            chunker,
            encoder,
        })
    }

    pub async fn build_snapshot(&self, folder: &Path) -> Result<(IndexSnapshot, IngestSummary)> {
        match tokio::fs::metadata(folder).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(RagError::NotFound(folder.to_path_buf())),
        }
        info!("Ingesting folder {}", folder.display());

        let (passages, num_files) = self.chunk_folder(folder.to_path_buf()).await?;
        info!(
            "Chunked {} files into {} passages",
            num_files,
            passages.len()
        );

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let encoded = self.encoder.encode(&texts).await?;
        let dimension = encoded.dimension;
        let vectors = encoded.embeddings;

        let metric = if self.encoder.normalizes() {
            Metric::InnerProduct
        } else {
            Metric::L2
        };
        let topology = IndexTopology::for_corpus(vectors.len(), &self.config.index);
        info!("Building {} index over {} vectors", topology, vectors.len());

        let index_config = self.config.index.clone();
        let (index, vectors) = tokio::task::spawn_blocking(move || {
            VectorIndex::build(topology, metric, &vectors, &index_config)
                .map(|index| (index, vectors))
        })
        .await??;

        let stamp = EncoderStamp::of(&self.encoder);
        let summary = IngestSummary {
            num_chunks: passages.len(),
            num_files,
            dimension,
            topology,
            model: stamp.model.clone(),
            normalized: stamp.normalized,
            created_at: Utc::now(),
            fingerprint: fingerprint_hex(&metadata_fingerprint(&passages)?),
        };
        let snapshot = IndexSnapshot::new(index, passages, stamp)?
            .with_vectors(Some(vectors))
            .with_summary(Some(summary.clone()));
        Ok((snapshot, summary))
    }

    /// Extracts and chunks every supported file, returning passages and the
    /// number of files that contributed at least one.
    async fn chunk_folder(&self, folder: PathBuf) -> Result<(Vec<Passage>, usize)> {
        let chunker = self.chunker;
        let snippet_chars = self.config.chunking.snippet_chars;

        tokio::task::spawn_blocking(move || {
            let files = collect_supported_files(&folder)?;
            if files.is_empty() {
                return Err(RagError::NoInput(folder));
            }

            let mut passages = Vec::new();
            let mut num_files = 0;
            for file in &files {
                let source = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let chunks = chunker.chunk_document(&source, &extract_text(file), snippet_chars);
                debug!("{} produced {} passages", source, chunks.len());
                if !chunks.is_empty() {
                    num_files += 1;
                }
                passages.extend(chunks);
            }

            if passages.is_empty() {
                return Err(RagError::EmptyCorpus(folder));
            }
            Ok((passages, num_files))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passage_embed::HashEmbedProvider;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn builder(chunk_size: usize, overlap: usize) -> IndexBuilder {
        let config = RagConfig::default().with_chunking(chunk_size, overlap);
        let encoder =
            Encoder::with_options(Arc::new(HashEmbedProvider::default()), 16, true).unwrap();
        IndexBuilder::new(config, encoder).unwrap()
    }

    #[tokio::test]
    async fn test_builds_aligned_snapshot() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Apples are fruit. Bananas are fruit.").unwrap();
        fs::write(dir.path().join("b.md"), "Carrots are vegetables.").unwrap();
        fs::write(dir.path().join("empty.txt"), "   \n").unwrap();

        let (snapshot, summary) = builder(20, 5).build_snapshot(dir.path()).await.unwrap();

        assert_eq!(snapshot.index().len(), snapshot.metadata().len());
        assert_eq!(summary.num_chunks, snapshot.len());
        assert_eq!(summary.num_files, 2);
        assert_eq!(summary.dimension, HashEmbedProvider::DEFAULT_DIMENSION);
        assert_eq!(summary.topology, IndexTopology::Flat);
        assert!(summary.normalized);
        assert_eq!(snapshot.vectors().map(<[_]>::len), Some(snapshot.len()));

        let sources: Vec<_> = snapshot.metadata().iter().map(|p| p.source.as_str()).collect();
        assert_eq!(sources.first(), Some(&"a.txt"));
        assert_eq!(sources.last(), Some(&"b.md"));
        for passage in snapshot.metadata() {
            assert!(passage.text.chars().count() <= 20);
        }
    }

    #[tokio::test]
    async fn test_missing_folder_is_not_found() {
        let dir = tempdir().unwrap();
        let err = builder(300, 50)
            .build_snapshot(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));

        let file = dir.path().join("file.txt");
        fs::write(&file, "text").unwrap();
        let err = builder(300, 50).build_snapshot(&file).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_only_images_is_no_input() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("photo.jpg"), [0xFF, 0xD8]).unwrap();
        let err = builder(300, 50).build_snapshot(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::NoInput(_)));
    }

    #[tokio::test]
    async fn test_blank_documents_are_empty_corpus() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blank.txt"), "\n\n   \n").unwrap();
        let err = builder(300, 50).build_snapshot(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
    }

    #[tokio::test]
    async fn test_large_corpus_gets_ivf() {
        let dir = tempdir().unwrap();
        let text: String = (0..60).map(|i| format!("Sentence number {i} here.\n")).collect();
        fs::write(dir.path().join("many.txt"), text).unwrap();

        let mut config = RagConfig::default().with_chunking(30, 5);
        config.index.ivf_threshold = 50;
        config.index.min_nlist = 4;
        let encoder =
            Encoder::with_options(Arc::new(HashEmbedProvider::default()), 16, true).unwrap();
        let (snapshot, summary) = IndexBuilder::new(config, encoder)
            .unwrap()
            .build_snapshot(dir.path())
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 60);
        assert!(matches!(summary.topology, IndexTopology::Ivf { nlist: 4, nprobe: 4 }));
        assert_eq!(snapshot.index().len(), 60);
    }
}
