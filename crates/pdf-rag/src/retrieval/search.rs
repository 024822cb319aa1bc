//! In-memory vector index for chunk storage and cosine search

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved chunk (embedding stripped)
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1], higher is better
    pub similarity: f32,
}

struct StoredChunk {
    chunk: Chunk,
    norm: f32,
}

#[derive(Default)]
struct Index {
    chunks: HashMap<Uuid, StoredChunk>,
    /// Document ID -> chunk IDs, for deletion
    document_chunks: HashMap<Uuid, Vec<Uuid>>,
}

/// Brute-force cosine index over chunk embeddings.
///
/// One uploaded document produces at most a few thousand chunks, so a linear
/// scan answers queries well within an LLM round trip.
pub struct VectorStore {
    dimensions: usize,
    index: RwLock<Index>,
}

impl VectorStore {
    /// Create an empty store for vectors of the given size
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            index: RwLock::new(Index::default()),
        }
    }

    /// Embedding dimensions accepted by this store
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert a chunk; its embedding must match the store's dimensions
    pub fn insert_chunk(&self, chunk: Chunk) -> Result<()> {
        if chunk.embedding.is_empty() {
            return Err(Error::vector_db("Chunk has no embedding"));
        }
        if chunk.embedding.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Embedding has {} dimensions, index expects {}",
                chunk.embedding.len(),
                self.dimensions
            )));
        }
        if chunk.embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::vector_db("Embedding contains non-finite values"));
        }

        let norm = l2_norm(&chunk.embedding);
        let chunk_id = chunk.id;
        let document_id = chunk.document_id;

        let mut index = self.index.write();
        let replaced = index
            .chunks
            .insert(chunk_id, StoredChunk { chunk, norm })
            .is_some();
        if !replaced {
            index
                .document_chunks
                .entry(document_id)
                .or_default()
                .push(chunk_id);
        }

        Ok(())
    }

    /// Return the `top_k` chunks most similar to `query_embedding`,
    /// optionally restricted to some documents
    pub fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Vec<SearchResult>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Query has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query_embedding);
        if query_norm == 0.0 || top_k == 0 {
            return Ok(Vec::new());
        }

        let index = self.index.read();
        let mut scored: Vec<(f32, &Chunk)> = index
            .chunks
            .values()
            .filter(|stored| {
                document_filter.map_or(true, |ids| ids.contains(&stored.chunk.document_id))
            })
            .map(|stored| {
                let similarity = if stored.norm == 0.0 {
                    0.0
                } else {
                    dot(query_embedding, &stored.chunk.embedding) / (query_norm * stored.norm)
                };
                (similarity, &stored.chunk)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(similarity, chunk)| SearchResult {
                chunk: Chunk {
                    embedding: Vec::new(),
                    ..chunk.clone()
                },
                similarity,
            })
            .collect())
    }

    /// Delete all chunks for a document
    pub fn delete_by_document(&self, document_id: &Uuid) -> usize {
        let mut index = self.index.write();
        let chunk_ids = index.document_chunks.remove(document_id).unwrap_or_default();

        chunk_ids
            .iter()
            .filter(|id| index.chunks.remove(*id).is_some())
            .count()
    }

    /// Number of chunks in the index
    pub fn len(&self) -> usize {
        self.index.read().chunks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of chunks belonging to a document
    pub fn document_len(&self, document_id: &Uuid) -> usize {
        self.index
            .read()
            .document_chunks
            .get(document_id)
            .map_or(0, Vec::len)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
