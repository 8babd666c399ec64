//! Prompt formatting for callers that hand the context block to a generator.

/// Instruction placed above the context block by default.
pub const DEFAULT_INSTRUCTION: &str =
    "Use the following context to answer accurately and concisely.";

/// Renders a query and its context block into a single prompt string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    instruction: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION)
    }
}

impl PromptTemplate {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    /// Without context only the question block is rendered.
    pub fn render(&self, query: &str, context: &str) -> String {
        let query = query.trim();
        let context = context.trim();
        if context.is_empty() {
            return format!("Question: {query}\nAnswer:");
        }
        format!(
            "{}\n\nContext:\n{context}\n\nQuestion: {query}\nAnswer:",
            self.instruction
        )
    }
}
