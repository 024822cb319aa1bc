//! Vector search and query answering

mod engine;
mod search;

pub use engine::QueryEngine;
pub use search::{SearchResult, VectorStore};
