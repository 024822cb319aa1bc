//! Application state for the PDF question-answering server

use dashmap::DashMap;
use handlebars::Handlebars;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{IngestPipeline, PreparedDocument};
use crate::providers::{
    local::LocalVectorStore, openai::OpenAiProvider, EmbeddingProvider, LlmProvider,
    VectorStoreProvider,
};
use crate::retrieval::QueryEngine;
use crate::types::{Chunk, Document, QueryRequest, QueryResponse};

use super::ui;

/// Result of handing an upload to the server
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The PDF was extracted, embedded and indexed
    New(Document),
    /// A PDF with identical text was already indexed
    Unchanged(Document),
}

impl IngestOutcome {
    /// The indexed document
    pub fn document(&self) -> &Document {
        match self {
            IngestOutcome::New(doc) | IngestOutcome::Unchanged(doc) => doc,
        }
    }

    /// Whether this upload created a new document
    pub fn is_new(&self) -> bool {
        matches!(self, IngestOutcome::New(_))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Embedding provider
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// LLM provider
    llm_provider: Arc<dyn LlmProvider>,
    /// Vector store for chunks
    vector_store_provider: Arc<dyn VectorStoreProvider>,
    /// Upload-to-index pipeline
    pipeline: IngestPipeline,
    /// Question answering
    query_engine: QueryEngine,
    /// Browser page templates
    templates: Handlebars<'static>,
    /// Document registry
    documents: DashMap<Uuid, Document>,
    /// Uploads being indexed, keyed by content hash
    ingesting: DashMap<String, Arc<Mutex<()>>>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state backed by the hosted OpenAI-compatible API and the in-memory index
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let (embedder, llm) = OpenAiProvider::new(&config)?.split();
        tracing::info!(
            "OpenAI providers initialized (chat: {}, embeddings: {})",
            config.llm.chat_model,
            config.embeddings.model
        );

        let vector_store = LocalVectorStore::with_dimensions(config.embeddings.dimensions);
        tracing::info!(
            "In-memory vector index initialized ({} dimensions)",
            config.embeddings.dimensions
        );

        Self::with_providers(config, Arc::new(embedder), Arc::new(llm), Arc::new(vector_store))
    }

    /// Create state over arbitrary providers
    pub fn with_providers(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        vector_store_provider: Arc<dyn VectorStoreProvider>,
    ) -> Result<Self> {
        let pipeline = IngestPipeline::new(
            &config,
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store_provider),
        );
        let query_engine = QueryEngine::new(
            &config,
            Arc::clone(&embedding_provider),
            Arc::clone(&llm_provider),
            Arc::clone(&vector_store_provider),
        );
        let templates = ui::templates()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                llm_provider,
                vector_store_provider,
                pipeline,
                query_engine,
                templates,
                documents: DashMap::new(),
                ingesting: DashMap::new(),
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }

    /// Get vector store provider
    pub fn vector_store_provider(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store_provider
    }

    /// Get page templates
    pub fn templates(&self) -> &Handlebars<'static> {
        &self.inner.templates
    }

    /// Extract and index an uploaded PDF.
    ///
    /// Uploads whose extracted text matches an indexed document return that
    /// document instead of indexing it again. Extraction and embedding are
    /// bounded by `upload.processing_timeout_secs`. Once embedded, a document
    /// is either fully indexed and registered or not indexed at all.
    pub async fn ingest_pdf(&self, filename: &str, data: &[u8]) -> Result<IngestOutcome> {
        let limit = Duration::from_secs(self.config().upload.processing_timeout_secs);
        let deadline = Instant::now() + limit;

        let prepared = within(deadline, filename, self.inner.pipeline.prepare(filename, data)).await?;
        let hash = prepared.parsed.content_hash.clone();

        // Same-content uploads queue behind each other so only one is indexed
        let lock = self.inner.ingesting.entry(hash.clone()).or_default().clone();
        let outcome = self.ingest_prepared(filename, prepared, deadline, &lock).await;

        drop(lock);
        self.inner
            .ingesting
            .remove_if(&hash, |_, lock| Arc::strong_count(lock) == 1);

        outcome
    }

    async fn ingest_prepared(
        &self,
        filename: &str,
        prepared: PreparedDocument,
        deadline: Instant,
        lock: &Mutex<()>,
    ) -> Result<IngestOutcome> {
        let _guard = within(deadline, filename, async { Ok(lock.lock().await) }).await?;

        if let Some(existing) = self.find_by_hash(&prepared.parsed.content_hash) {
            tracing::info!(
                "{} has the same content as already indexed {} ({})",
                filename,
                existing.filename,
                existing.id
            );
            return Ok(IngestOutcome::Unchanged(existing));
        }

        let (doc, chunks) = within(deadline, filename, self.inner.pipeline.embed(prepared)).await?;

        // Runs to completion even if the caller goes away
        let state = self.clone();
        let doc = tokio::spawn(async move { state.commit(doc, chunks).await })
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        Ok(IngestOutcome::New(doc))
    }

    /// Insert a document's chunks and register it, removing any chunks
    /// already inserted when the insert fails
    async fn commit(&self, doc: Document, chunks: Vec<Chunk>) -> Result<Document> {
        let store = &self.inner.vector_store_provider;

        if let Err(e) = store.insert_chunks(&chunks).await {
            match store.delete_by_document(&doc.id).await {
                Ok(0) => {}
                Ok(removed) => tracing::warn!(
                    "Removed {} partially indexed chunks of {}",
                    removed,
                    doc.filename
                ),
                Err(cleanup) => tracing::error!(
                    "Failed to remove partially indexed chunks of {} ({}): {}",
                    doc.filename,
                    doc.id,
                    cleanup
                ),
            }
            return Err(e);
        }

        tracing::info!(
            "Indexed {} as {} ({} chunks)",
            doc.filename,
            doc.id,
            doc.total_chunks
        );
        self.inner.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    fn find_by_hash(&self, content_hash: &str) -> Option<Document> {
        self.inner
            .documents
            .iter()
            .find(|entry| entry.value().content_hash == content_hash)
            .map(|entry| entry.value().clone())
    }

    /// Answer a question, checking the target document exists first
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        if let Some(id) = request.document_id {
            if !self.inner.documents.contains_key(&id) {
                return Err(Error::DocumentNotFound(id.to_string()));
            }
        }
        self.inner.query_engine.query(request).await
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &Uuid) -> Option<Document> {
        self.inner.documents.get(id).map(|r| r.value().clone())
    }

    /// List all documents, newest first
    pub fn list_documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .inner
            .documents
            .iter()
            .map(|r| r.value().clone())
            .collect();
        docs.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
        docs
    }

    /// Remove a document and its chunks, returning the number of chunks deleted
    pub async fn delete_document(&self, id: &Uuid) -> Result<usize> {
        let (_, doc) = self
            .inner
            .documents
            .remove(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

        let deleted = self.inner.vector_store_provider.delete_by_document(id).await?;
        tracing::info!("Deleted {} ({} chunks)", doc.filename, deleted);
        Ok(deleted)
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}

/// Fail with `Error::Timeout` if `fut` has not finished by `deadline`
async fn within<T>(
    deadline: Instant,
    filename: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "Processing {} took too long",
            filename
        ))),
    }
}
