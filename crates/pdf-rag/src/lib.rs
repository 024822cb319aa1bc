//! pdf-rag: ask questions about an uploaded PDF
//!
//! A small web application: upload a PDF in the browser, the text is extracted
//! page by page, chunked, embedded through a hosted OpenAI-compatible API and
//! kept in an in-memory vector index. Questions are answered by the hosted
//! chat model from the most similar chunks, with page-level sources.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, ChunkSource, Document},
    query::QueryRequest,
    response::{Citation, QueryResponse},
};
