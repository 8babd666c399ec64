//! Passage records and ranked retrieval items.

use serde::{Deserialize, Serialize};

/// Default length, in characters, of the snippet stored with every passage.
pub const DEFAULT_SNIPPET_CHARS: usize = 400;

/// A bounded slice of a document, the unit that gets embedded and retrieved.
///
/// Passages are immutable once created. Within one source, `chunk_index` is a
/// 0-based sequence number that follows document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// File name of the document the passage was cut from.
    pub source: String,
    /// Position of the passage within its source.
    pub chunk_index: usize,
    /// Full passage text.
    pub text: String,
    /// Prefix of `text` used when building prompt context.
    pub snippet: String,
}

impl Passage {
    /// Creates a passage whose snippet is the first `snippet_chars` characters of `text`.
    pub fn new(
        source: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        snippet_chars: usize,
    ) -> Self {
        let text = text.into();
        let snippet = truncate_chars(&text, snippet_chars).to_string();
        Self {
            source: source.into(),
            chunk_index,
            text,
            snippet,
        }
    }
}

/// A passage returned by a similarity search, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub source: String,
    pub chunk_index: usize,
    pub snippet: String,
    pub score: f32,
}

impl RetrievedItem {
    pub fn from_passage(passage: &Passage, score: f32) -> Self {
        Self {
            source: passage.source.clone(),
            chunk_index: passage.chunk_index,
            snippet: passage.snippet.clone(),
            score,
        }
    }
}

/// Returns the longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Returns the shortest suffix of `text` holding at most `max_chars` characters.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_is_bounded_prefix() {
        let passage = Passage::new("faq.md", 3, "Opening hours are nine to five.", 12);
        assert_eq!(passage.snippet, "Opening hour");
        assert_eq!(passage.chunk_index, 3);

        let short = Passage::new("faq.md", 0, "Short.", 400);
        assert_eq!(short.snippet, "Short.");
    }

    #[test]
    fn test_truncate_and_tail_respect_char_boundaries() {
        assert_eq!(truncate_chars("größe", 3), "grö");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");

        assert_eq!(tail_chars("größe", 3), "öße");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_passage_serializes_with_stable_field_names() {
        let passage = Passage::new("a.txt", 1, "text", 400);
        let json = serde_json::to_value(&passage).unwrap();
        assert_eq!(json["source"], "a.txt");
        assert_eq!(json["chunk_index"], 1);
        assert_eq!(json["text"], "text");
        assert_eq!(json["snippet"], "text");
    }
}
