//! On-disk persistence of a built index.
//!
//! An index directory holds four artifacts:
//!
//! | file | contents | required |
//! |---|---|---|
//! | `vector_index.bin` | index structure, tagged with the metadata fingerprint and encoder | yes |
//! | `vector_meta.json` | metadata table, one passage per index row | yes |
//! | `embeddings.bin` | raw passage vectors | no |
//! | `chunk_info.json` | ingest summary | no |
//!
//! Saving removes the index file first and writes it last, each file going
//! through a `.tmp` sibling and a rename. A present index file therefore
//! always belongs to a complete set of artifacts.

pub mod format;

use crate::error::{RagError, Result};
use crate::retrieval::snapshot::{IndexSnapshot, IngestSummary, metadata_fingerprint};
use format::IndexStamp;
use passage_context::Passage;
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "vector_index.bin";
pub const METADATA_FILE: &str = "vector_meta.json";
pub const VECTORS_FILE: &str = "embeddings.bin";
pub const SUMMARY_FILE: &str = "chunk_info.json";

#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// True when both required artifacts are on disk.
    pub fn exists(&self) -> bool {
        self.index_path().is_file() && self.metadata_path().is_file()
    }

    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        if remove_if_present(&self.index_path())? {
            tracing::debug!("Removed previous index file");
        }

        match snapshot.vectors() {
            Some(vectors) => write_atomic(&self.vectors_path(), &format::encode_vectors(vectors)?)?,
            None => {
                remove_if_present(&self.vectors_path())?;
            }
        }
        write_atomic(
            &self.metadata_path(),
            &serde_json::to_vec_pretty(snapshot.metadata())?,
        )?;
        match snapshot.summary() {
            Some(summary) => {
                write_atomic(&self.summary_path(), &serde_json::to_vec_pretty(summary)?)?
            }
            None => {
                remove_if_present(&self.summary_path())?;
            }
        }

        let stamp = IndexStamp {
            fingerprint: metadata_fingerprint(snapshot.metadata())?,
            encoder: snapshot.encoder().clone(),
        };
        write_atomic(
            &self.index_path(),
            &format::encode_index(snapshot.index(), &stamp)?,
        )?;

        tracing::info!(
            "Saved index with {} chunks to {}",
            snapshot.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Loads index and metadata, verifying they belong together.
    ///
    /// The vector cache and summary are optional; problems with either are
    /// logged and they come back as `None`.
    pub fn load(&self) -> Result<IndexSnapshot> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();
        for path in [&index_path, &metadata_path] {
            if !path.is_file() {
                return Err(RagError::NotFound(path.clone()));
            }
        }

        let metadata: Vec<Passage> = serde_json::from_slice(&fs::read(&metadata_path)?)
            .map_err(|e| RagError::corrupt(format!("{METADATA_FILE} is unreadable: {e}")))?;
        let (index, stamp) = format::decode_index(&fs::read(&index_path)?)?;

        if stamp.fingerprint != metadata_fingerprint(&metadata)? {
            return Err(RagError::corrupt(format!(
                "{INDEX_FILE} was built for different metadata than {METADATA_FILE}"
            )));
        }

        let vectors = self.load_vectors(metadata.len());
        let summary = self.load_summary();
        let snapshot = IndexSnapshot::new(index, metadata, stamp.encoder)?
            .with_vectors(vectors)
            .with_summary(summary);

        tracing::info!(
            "Loaded index with {} chunks ({}) from {}",
            snapshot.len(),
            snapshot.topology(),
            self.dir.display()
        );
        Ok(snapshot)
    }

    fn load_vectors(&self, expected_rows: usize) -> Option<Vec<Vec<f32>>> {
        let path = self.vectors_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Vector cache {} unavailable: {}", path.display(), e);
                return None;
            }
        };
        match format::decode_vectors(&bytes) {
            Ok(vectors) if vectors.len() == expected_rows => Some(vectors),
            Ok(vectors) => {
                tracing::warn!(
                    "Ignoring vector cache with {} rows, expected {}",
                    vectors.len(),
                    expected_rows
                );
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable vector cache: {}", e);
                None
            }
        }
    }

    fn load_summary(&self) -> Option<IngestSummary> {
        let bytes = fs::read(self.summary_path()).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", SUMMARY_FILE, e);
                None
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
