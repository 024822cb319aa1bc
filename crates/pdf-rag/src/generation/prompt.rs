//! Prompt templates for RAG generation

use crate::providers::vector_store::VectorSearchResult;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// System message sent with every question
    pub const SYSTEM_PROMPT: &'static str = "You are an expert Q&A system that is trusted around the world. \
Always answer the query using the provided context information, and not prior knowledge. \
Never directly reference the given context in your answer. \
If the context does not contain the answer, say that the document does not cover it.";

    /// Build context from search results
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            if i > 0 {
                context.push_str("\n\n");
            }
            context.push_str(&format!(
                "[{}] {}\n{}",
                i + 1,
                result.chunk.source.format_citation(),
                result.chunk.content.trim()
            ));
        }

        context
    }

    /// Build the question-answering prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Context information is below.
---------------------
{context}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {question}
Answer: "#,
            context = context,
            question = question.trim()
        )
    }
}
