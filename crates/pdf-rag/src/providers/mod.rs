//! Provider abstractions for embeddings, answer generation and vector storage
//!
//! The hosted API sits behind `EmbeddingProvider` and `LlmProvider`, the
//! in-memory index behind `VectorStoreProvider`, so the server and tests can
//! swap implementations freely.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod openai;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};
