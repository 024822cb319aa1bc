//! Prompt construction and citation formatting

pub mod citation;
pub mod prompt;

pub use citation::{highlight_snippet, query_terms, truncate_snippet};
pub use prompt::PromptBuilder;
