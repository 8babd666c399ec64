//! Text-side building blocks for the passage retrieval core: the passage
//! model, the sentence-aware [`Chunker`], and the context assembler that turns
//! ranked results into a bounded block for a downstream generator.

pub mod assemble;
pub mod chunker;
pub mod passage;
pub mod prompt;

pub use assemble::{AssembledContext, DEFAULT_MAX_CONTEXT_CHARS, assemble_context};
pub use chunker::{Chunker, ChunkerError, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use passage::{DEFAULT_SNIPPET_CHARS, Passage, RetrievedItem, tail_chars, truncate_chars};
pub use prompt::PromptTemplate;
