//! Question answering over the vector index

use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{highlight_snippet, query_terms, truncate_snippet, PromptBuilder};
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::types::{Citation, QueryRequest, QueryResponse};

/// Longest snippet shown for a source, in bytes
const SNIPPET_MAX_LEN: usize = 300;

/// Embeds a question, retrieves the closest chunks and asks the LLM
pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    default_top_k: usize,
    default_threshold: Option<f32>,
}

impl QueryEngine {
    /// Create an engine over the given providers
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            embedder,
            llm,
            vector_store,
            default_top_k: config.retrieval.top_k,
            default_threshold: config.retrieval.similarity_threshold,
        }
    }

    /// Answer a question from the indexed chunks
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("Question must not be empty".to_string()));
        }

        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(Error::InvalidRequest("top_k must be positive".to_string()));
        }
        let threshold = request.similarity_threshold.or(self.default_threshold);

        tracing::info!("Query: \"{}\"", question);

        let query_embedding = self.embedder.embed(question).await?;

        let filter = request.document_id.map(|id| vec![id]);
        let mut results = self
            .vector_store
            .search(&query_embedding, top_k, filter.as_deref())
            .await?;

        if let Some(threshold) = threshold {
            results.retain(|r| r.similarity >= threshold);
        }

        if results.is_empty() {
            tracing::info!("No relevant chunks for query (threshold {:?})", threshold);
            return Ok(QueryResponse::not_found(start.elapsed().as_millis() as u64));
        }

        let terms = query_terms(question);
        let citations: Vec<Citation> = results
            .iter()
            .map(|r| {
                let mut citation = Citation::from_chunk(&r.chunk, r.similarity);
                citation.snippet = truncate_snippet(&r.chunk.content, SNIPPET_MAX_LEN);
                citation.snippet_highlighted = highlight_snippet(&citation.snippet, &terms);
                citation
            })
            .collect();

        let context = PromptBuilder::build_context(&results);
        let answer = self.llm.generate_answer(question, &context).await?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        let response = QueryResponse::new(answer.trim().to_string(), citations, processing_time_ms);

        tracing::info!(
            "Query completed in {}ms, {} sources, confidence {:.2}",
            processing_time_ms,
            response.citations.len(),
            response.confidence
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::LocalVectorStore;
    use crate::testing::{test_config, EchoLlm, HashEmbedder};
    use crate::types::{Chunk, ChunkSource};
    use uuid::Uuid;

    struct Fixture {
        engine: QueryEngine,
        llm: Arc<EchoLlm>,
        policy: Uuid,
        handbook: Uuid,
    }

    async fn fixture() -> Fixture {
        let config = test_config();
        let embedder = Arc::new(HashEmbedder::new(config.embeddings.dimensions));
        let llm = Arc::new(EchoLlm::default());
        let store = Arc::new(LocalVectorStore::with_dimensions(config.embeddings.dimensions));

        let policy = Uuid::new_v4();
        let handbook = Uuid::new_v4();
        let texts = [
            (policy, 1, "Maternity leave lasts 26 weeks."),
            (policy, 2, "Employees get 20 days of paid leave."),
            (handbook, 1, "The cafeteria opens at noon."),
        ];

        let mut chunks = Vec::new();
        for (i, (doc, page, text)) in texts.iter().enumerate() {
            let mut chunk = Chunk::new(
                *doc,
                text.to_string(),
                ChunkSource::pdf("policy.pdf".to_string(), *page, 2),
                0,
                text.len(),
                i as u32,
            );
            chunk.embedding = embedder.embed(text).await.unwrap();
            chunks.push(chunk);
        }
        store.insert_chunks(&chunks).await.unwrap();

        let engine = QueryEngine::new(&config, embedder, llm.clone(), store);
        Fixture {
            engine,
            llm,
            policy,
            handbook,
        }
    }

    #[tokio::test]
    async fn test_answers_with_sources() {
        let f = fixture().await;

        let response = f
            .engine
            .query(&QueryRequest::new("How long is maternity leave?").with_top_k(1))
            .await
            .unwrap();

        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].page_number, Some(1));
        assert!(response.citations[0]
            .snippet_highlighted
            .contains("<mark>Maternity</mark>"));
        assert!(response.answer.contains("Maternity leave lasts 26 weeks."));
        assert!(response.confidence > 0.0);
        assert_eq!(f.llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let f = fixture().await;

        let response = f
            .engine
            .query(&QueryRequest::new("When does the cafeteria open?").for_document(f.policy))
            .await
            .unwrap();

        assert!(response.citations.iter().all(|c| c.document_id == f.policy));

        let response = f
            .engine
            .query(&QueryRequest::new("When does the cafeteria open?").for_document(f.handbook))
            .await
            .unwrap();

        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].document_id, f.handbook);
    }

    #[tokio::test]
    async fn test_threshold_filters_everything() {
        let f = fixture().await;

        let response = f
            .engine
            .query(&QueryRequest::new("Quarterly revenue targets").with_threshold(0.99))
            .await
            .unwrap();

        assert!(response.citations.is_empty());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(f.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_threshold_keeps_dissimilar_hits() {
        let config = test_config();
        let embedder = Arc::new(HashEmbedder::new(config.embeddings.dimensions));
        let llm = Arc::new(EchoLlm::default());
        let store = Arc::new(LocalVectorStore::with_dimensions(config.embeddings.dimensions));

        let question = "How long is maternity leave?";
        let text = "Opposite of the question.";
        let mut chunk = Chunk::new(
            Uuid::new_v4(),
            text.to_string(),
            ChunkSource::pdf("policy.pdf".to_string(), 1, 1),
            0,
            text.len(),
            0,
        );
        chunk.embedding = embedder
            .embed(question)
            .await
            .unwrap()
            .into_iter()
            .map(|v| -v)
            .collect();
        store.insert_chunks(&[chunk]).await.unwrap();

        let engine = QueryEngine::new(&config, embedder, llm.clone(), store);

        let response = engine.query(&QueryRequest::new(question)).await.unwrap();
        assert_eq!(response.citations.len(), 1);
        assert!(response.citations[0].similarity_score < 0.0);
        assert_eq!(llm.calls(), 1);

        let response = engine
            .query(&QueryRequest::new(question).with_threshold(0.0))
            .await
            .unwrap();
        assert!(response.citations.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let f = fixture().await;

        let err = f.engine.query(&QueryRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
