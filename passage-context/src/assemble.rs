//! Turns ranked retrieval results into a bounded context block.
//!
//! The context block is what a downstream text generator sees: the snippets
//! of the retrieved passages, best match first, one per line, cut off at a
//! fixed character budget. It deliberately carries no source names or scores.
//! Attribution is kept separately in [`AssembledContext::items`] so callers can
//! still show citations.

use serde::Serialize;

use crate::passage::{RetrievedItem, truncate_chars};

/// Default character budget for the context block.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 1200;

/// Context block plus the ranked items it was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    /// Attribution-free, newline-separated snippets, truncated to the budget.
    pub context: String,
    /// Every ranked item in rank order, including ones whose snippet was empty
    /// or fell outside the budget.
    pub items: Vec<RetrievedItem>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

/// Concatenates snippets in rank order and truncates the result to `max_context_chars`.
pub fn assemble_context(items: Vec<RetrievedItem>, max_context_chars: usize) -> AssembledContext {
    let joined = items
        .iter()
        .map(|item| item.snippet.trim())
        .filter(|snippet| !snippet.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    AssembledContext {
        context: truncate_chars(&joined, max_context_chars).to_string(),
        items,
    }
}
