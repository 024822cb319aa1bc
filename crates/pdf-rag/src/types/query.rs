//! Query request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question about one or all uploaded documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Restrict retrieval to one document
    #[serde(default)]
    pub document_id: Option<Uuid>,

    /// Number of chunks to retrieve (config default when absent)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Minimum similarity (config default when absent)
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

impl QueryRequest {
    /// Create a new query
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Ask about a single document
    pub fn for_document(mut self, document_id: Uuid) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Set the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set the similarity threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"question": "What is the leave policy?"}"#).unwrap();
        assert_eq!(request.question, "What is the leave policy?");
        assert!(request.document_id.is_none());
        assert!(request.top_k.is_none());
    }
}
