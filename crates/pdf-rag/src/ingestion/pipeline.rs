//! Upload-to-index pipeline

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::chunker::TextChunker;
use super::parser::{FileParser, ParsedDocument};
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::{Chunk, Document};

/// An upload whose text has been extracted but not yet indexed
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Filename as uploaded
    pub filename: String,
    /// Upload size in bytes
    pub file_size: u64,
    /// Extracted text
    pub parsed: ParsedDocument,
}

/// Extracts, chunks, embeds and indexes uploaded PDFs
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    chunker: TextChunker,
    staging_dir: PathBuf,
    batch_size: usize,
}

impl IngestPipeline {
    /// Create a pipeline over the given providers
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
            .with_min_size(config.chunking.min_chunk_size);

        Self {
            embedder,
            vector_store,
            chunker,
            staging_dir: config.upload.staging_dir.clone(),
            batch_size: config.embeddings.batch_size.max(1),
        }
    }

    /// Stage the upload in a temporary file and extract its text.
    ///
    /// The staged file is removed as soon as parsing finishes, whether or
    /// not it succeeded.
    pub async fn prepare(&self, filename: &str, data: &[u8]) -> Result<PreparedDocument> {
        FileParser::check_pdf(filename, data)?;

        let staging_dir = self.staging_dir.clone();
        let name = filename.to_string();
        let bytes = data.to_vec();

        let parsed = tokio::task::spawn_blocking(move || {
            let staged = stage_upload(&staging_dir, &bytes)?;
            tracing::debug!("Staged {} at {}", name, staged.path().display());
            FileParser::parse_file(&name, staged.path())
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        Ok(PreparedDocument {
            filename: filename.to_string(),
            file_size: data.len() as u64,
            parsed,
        })
    }

    /// Chunk and embed a prepared document without touching the index
    pub async fn embed(&self, prepared: PreparedDocument) -> Result<(Document, Vec<Chunk>)> {
        let PreparedDocument { filename, file_size, parsed } = prepared;

        let mut doc = Document::new(filename, parsed.content_hash.clone(), file_size);
        doc.total_pages = parsed.total_pages;

        let mut chunks = self.chunker.chunk_document(&doc, &parsed);
        if chunks.is_empty() {
            return Err(Error::file_parse(
                &doc.filename,
                "Extracted text is too short to index",
            ));
        }

        tracing::info!(
            "Embedding {} chunks of {} with {}",
            chunks.len(),
            doc.filename,
            self.embedder.name()
        );

        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        doc.total_chunks = chunks.len() as u32;
        Ok((doc, chunks))
    }

    /// Chunk, embed and index a prepared document
    pub async fn index(&self, prepared: PreparedDocument) -> Result<Document> {
        let (doc, chunks) = self.embed(prepared).await?;
        self.vector_store.insert_chunks(&chunks).await?;
        Ok(doc)
    }

    /// Prepare and index in one step
    pub async fn ingest(&self, filename: &str, data: &[u8]) -> Result<Document> {
        let prepared = self.prepare(filename, data).await?;
        self.index(prepared).await
    }
}

/// Write an upload to a named temporary file that deletes itself on drop
fn stage_upload(dir: &Path, data: &[u8]) -> Result<tempfile::NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("pdf-rag-upload-")
        .suffix(".pdf")
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::LocalVectorStore;
    use crate::testing::{build_pdf, test_config, HashEmbedder};

    fn pipeline(config: &RagConfig) -> (IngestPipeline, Arc<LocalVectorStore>) {
        let store = Arc::new(LocalVectorStore::with_dimensions(config.embeddings.dimensions));
        let embedder = Arc::new(HashEmbedder::new(config.embeddings.dimensions));
        (IngestPipeline::new(config, embedder, store.clone()), store)
    }

    #[tokio::test]
    async fn test_ingest_indexes_every_chunk() {
        let config = test_config();
        let (pipeline, store) = pipeline(&config);
        let data = build_pdf(&[
            "Employees are entitled to twenty days of paid leave each year.",
            "Maternity leave lasts twenty six weeks.",
        ]);

        let doc = pipeline.ingest("policy.pdf", &data).await.unwrap();

        assert_eq!(doc.filename, "policy.pdf");
        assert_eq!(doc.total_pages, Some(2));
        assert!(doc.total_chunks >= 2);
        assert_eq!(doc.file_size, data.len() as u64);
        assert_eq!(store.inner().len(), doc.total_chunks as usize);
    }

    #[tokio::test]
    async fn test_embed_leaves_index_untouched() {
        let config = test_config();
        let (pipeline, store) = pipeline(&config);
        let data = build_pdf(&["Sick leave requires a medical certificate after two days."]);

        let prepared = pipeline.prepare("policy.pdf", &data).await.unwrap();
        let (doc, chunks) = pipeline.embed(prepared).await.unwrap();

        assert_eq!(doc.total_chunks as usize, chunks.len());
        assert!(chunks.iter().all(|c| c.embedding.len() == config.embeddings.dimensions));
        assert!(chunks.iter().all(|c| c.document_id == doc.id));
        assert!(store.inner().is_empty());
    }

    #[tokio::test]
    async fn test_staged_file_is_removed() {
        let staging = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.upload.staging_dir = staging.path().to_path_buf();
        let (pipeline, _) = pipeline(&config);

        let data = build_pdf(&["Casual leave must be applied for in advance."]);
        tokio_test::assert_ok!(pipeline.prepare("policy.pdf", &data).await);

        let leftovers = std::fs::read_dir(staging.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_before_staging() {
        let config = test_config();
        let (pipeline, store) = pipeline(&config);

        let err = pipeline.ingest("notes.txt", b"plain text").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert!(store.inner().is_empty());
    }
}
