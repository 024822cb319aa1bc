//! Core types for document ingestion and question answering

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, Document};
pub use query::QueryRequest;
pub use response::{Citation, QueryResponse};
