//! PDF ingestion: text extraction, chunking and indexing

mod chunker;
mod parser;
mod pipeline;

pub use chunker::TextChunker;
pub use parser::{FileParser, PageContent, ParsedDocument};
pub use pipeline::{IngestPipeline, PreparedDocument};
