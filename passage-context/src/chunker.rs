//! Splits extracted document text into bounded, overlapping passages.
//!
//! Passages are the atomic unit of indexing and retrieval: every passage is
//! embedded on its own and every search hit points back at exactly one of them.
//! The chunker therefore has two jobs. It must keep each passage short enough
//! for the embedding model, and it must keep passages readable, which means
//! cutting near sentence boundaries rather than in the middle of a word.
//!
//! # Algorithm
//!
//! 1. Carriage returns become spaces and the text is trimmed.
//! 2. The text is split into sentence-like *units*: first on line breaks, then
//!    after sentence-terminating punctuation (`.`, `!`, `?`) that is followed
//!    by whitespace. The punctuation stays attached to its sentence.
//! 3. Units are packed greedily into a buffer, joined by a single space, for as
//!    long as the buffer stays within `chunk_size`. When the next unit does not
//!    fit, the buffer is closed as a chunk and the next buffer is seeded with
//!    the last `chunk_overlap` characters of the closed chunk.
//! 4. A packed chunk that is still longer than `chunk_size` (a single oversized
//!    sentence, or an overlap seed plus a long sentence) is hard-split into
//!    slices of `chunk_size` characters taken every `chunk_size - chunk_overlap`
//!    characters, so consecutive slices share `chunk_overlap` characters.
//!
//! All lengths are counted in characters, never in bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```
//! use passage_context::Chunker;
//!
//! let chunker = Chunker::new(40, 10).unwrap();
//! let chunks = chunker.chunk(
//!     "The store opens at nine. Deliveries start at ten. Returns are accepted within a week.",
//! );
//!
//! assert_eq!(chunks[0], "The store opens at nine.");
//! // The second chunk carries the tail of the first one.
//! assert!(chunks[1].starts_with("s at nine."));
//! assert!(chunks.iter().all(|c| c.chars().count() <= 40));
//! ```
use regex::Regex;
use std::sync::LazyLock;

use crate::passage::{Passage, tail_chars};

/// Default maximum passage length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 300;

/// Default number of characters carried from one passage into the next.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Sentence terminators followed by whitespace. Only used within a single line.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence break pattern is valid"));

/// Errors raised when a [`Chunker`] is configured with impossible bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkerError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidOverlap { size: usize, overlap: usize },
}

/// Sentence-aware text splitter with a hard upper bound on passage length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Creates a chunker producing passages of at most `chunk_size` characters.
    ///
    /// # Errors
    /// Returns [`ChunkerError`] when `chunk_size` is zero or when the overlap is
    /// not strictly smaller than the chunk size (the hard-split stride would be
    /// zero).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkerError::InvalidOverlap {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into an ordered sequence of passage strings.
    ///
    /// Empty (or whitespace-only) input yields an empty vector. Text that fits
    /// within `chunk_size` yields exactly one chunk.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let normalized = text.replace('\r', " ");
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return Vec::new();
        }

        let units = split_units(normalized);
        let mut chunks = Vec::new();
        for packed in self.pack(&units) {
            if packed.chars().count() <= self.chunk_size {
                chunks.push(packed);
            } else {
                chunks.extend(self.hard_split(&packed));
            }
        }
        chunks
    }

    /// Chunks a whole document and numbers the resulting passages from zero.
    pub fn chunk_document(&self, source: &str, text: &str, snippet_chars: usize) -> Vec<Passage> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, chunk_text)| {
                Passage::new(source, chunk_index, chunk_text, snippet_chars)
            })
            .collect()
    }

    fn pack(&self, units: &[&str]) -> Vec<String> {
        let mut packed = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for unit in units {
            let unit_len = unit.chars().count();
            let joined_len = if current.is_empty() {
                unit_len
            } else {
                current_len + 1 + unit_len
            };

            if joined_len <= self.chunk_size {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(unit);
                current_len = joined_len;
                continue;
            }

            if current.is_empty() {
                // Oversized unit with nothing buffered; hard-split later.
                current.push_str(unit);
                current_len = unit_len;
                continue;
            }

            let seed = tail_chars(&current, self.chunk_overlap).to_string();
            packed.push(std::mem::take(&mut current));

            if seed.is_empty() {
                current.push_str(unit);
                current_len = unit_len;
            } else {
                current_len = seed.chars().count() + 1 + unit_len;
                current.push_str(&seed);
                current.push(' ');
                current.push_str(unit);
            }
        }

        if !current.is_empty() {
            packed.push(current);
        }
        packed
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let stride = self.chunk_size - self.chunk_overlap;
        let mut slices = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let slice: String = chars[start..end].iter().collect();
            let slice = slice.trim();
            if !slice.is_empty() {
                slices.push(slice.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        slices
    }
}

/// Splits text into trimmed, non-empty sentence-like units.
fn split_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    for line in text.split('\n') {
        let mut start = 0;
        for found in SENTENCE_BREAK.find_iter(line) {
            let end = found.start() + found.as_str().trim_end().len();
            push_unit(&mut units, &line[start..end]);
            start = found.end();
        }
        push_unit(&mut units, &line[start..]);
    }
    units
}

fn push_unit<'a>(units: &mut Vec<&'a str>, candidate: &'a str) {
    let candidate = candidate.trim();
    if !candidate.is_empty() {
        units.push(candidate);
    }
}
