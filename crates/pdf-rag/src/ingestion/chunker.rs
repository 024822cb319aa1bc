//! Text chunking with page and position tracking

use unicode_segmentation::UnicodeSegmentation;

use super::parser::ParsedDocument;
use crate::types::{Chunk, ChunkSource, Document};

/// Sentence-packing chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in bytes
    chunk_size: usize,
    /// Overlap carried into the next chunk
    overlap: usize,
    /// Minimum chunk size
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_size: 20,
        }
    }

    /// Drop chunks shorter than `min_size` bytes
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Chunk a parsed document page by page.
    ///
    /// Chunks never span pages, so every chunk can cite a single page.
    pub fn chunk_document(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            let source = ChunkSource {
                filename: doc.filename.clone(),
                page_number: page.page_number,
                page_count: parsed.total_pages,
            };
            self.chunk_text(&page.content, doc, &source, page.char_offset, &mut chunks);
        }

        chunks
    }

    /// Chunk one span of text, appending to `chunks`
    fn chunk_text(
        &self,
        text: &str,
        doc: &Document,
        source: &ChunkSource,
        base_offset: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        // Invariant: current == text[current_start..pos]
        let mut current = String::new();
        let mut current_start = 0usize;
        let mut pos = 0usize;

        for sentence in text.split_sentence_bounds() {
            if !current.is_empty() && current.len() + sentence.len() > self.chunk_size {
                self.push_chunk(chunks, &current, doc, source, base_offset + current_start, base_offset + pos);

                // The carried tail may not push the next chunk past chunk_size
                let budget = self.overlap.min(self.chunk_size.saturating_sub(sentence.len()));
                let overlap = overlap_tail(&current, budget);
                current_start = pos - overlap.len();
                current = overlap.to_string();
            }

            current.push_str(sentence);
            pos += sentence.len();
        }

        self.push_chunk(chunks, &current, doc, source, base_offset + current_start, base_offset + pos);
    }

    fn push_chunk(
        &self,
        chunks: &mut Vec<Chunk>,
        text: &str,
        doc: &Document,
        source: &ChunkSource,
        char_start: usize,
        char_end: usize,
    ) {
        let content = text.trim();
        if content.len() < self.min_size {
            return;
        }

        let index = chunks.len() as u32;
        chunks.push(Chunk::new(
            doc.id,
            content.to_string(),
            source.clone(),
            char_start,
            char_end,
            index,
        ));
    }
}

/// Tail of a chunk, at most `max` bytes, to repeat at the start of the next one.
///
/// Always a suffix of `text`, starting on a sentence or word boundary
/// when one is available.
fn overlap_tail(text: &str, max: usize) -> &str {
    if max == 0 {
        return "";
    }
    if text.len() <= max {
        return text;
    }

    let mut start = text.len() - max;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }

    let tail = &text[start..];

    // A sentence break right at the end would leave no overlap at all
    if let Some(pos) = tail.trim_end().find(". ") {
        return &tail[pos + 2..];
    }
    if let Some(pos) = tail.find(' ') {
        return &tail[pos + 1..];
    }

    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::PageContent;

    fn parsed(pages: &[&str]) -> ParsedDocument {
        let mut content = String::new();
        let mut page_contents = Vec::new();
        for (i, page) in pages.iter().enumerate() {
            if !content.is_empty() {
                content.push('\n');
            }
            page_contents.push(PageContent {
                page_number: Some(i as u32 + 1),
                content: page.to_string(),
                char_offset: content.len(),
            });
            content.push_str(page);
        }
        ParsedDocument {
            content_hash: String::new(),
            content,
            total_pages: Some(pages.len() as u32),
            pages: page_contents,
        }
    }

    fn doc() -> Document {
        Document::new("policy.pdf".to_string(), String::new(), 0)
    }

    fn long_page() -> String {
        (1..=12)
            .map(|i| format!("Sentence number {} talks about the leave policy. ", i))
            .collect()
    }

    #[test]
    fn test_chunks_respect_size() {
        let page = long_page();
        let parsed = parsed(&[&page]);
        let chunks = TextChunker::new(150, 40).chunk_document(&doc(), &parsed);

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 150, "chunk too long: {}", chunk.content.len());
        }
    }

    #[test]
    fn test_overlap_shrinks_for_long_sentences() {
        let page: String = ["alpha", "bravo", "delta"]
            .iter()
            .map(|word| format!("{}{}. ", format!("{} ", word).repeat(19), word))
            .collect();
        let parsed = parsed(&[&page]);
        let chunks = TextChunker::new(150, 60).chunk_document(&doc(), &parsed);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 150, "chunk too long: {}", chunk.content.len());
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].char_start < pair[0].char_end);
        }
    }

    #[test]
    fn test_offsets_match_content() {
        let page = long_page();
        let parsed = parsed(&["Short first page with a sentence.", &page]);
        let chunks = TextChunker::new(150, 40).chunk_document(&doc(), &parsed);

        for chunk in &chunks {
            assert_eq!(
                parsed.content[chunk.char_start..chunk.char_end].trim(),
                chunk.content
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let page = long_page();
        let parsed = parsed(&[&page]);
        let chunks = TextChunker::new(150, 60).chunk_document(&doc(), &parsed);

        for pair in chunks.windows(2) {
            assert!(pair[1].char_start < pair[0].char_end);
        }
    }

    #[test]
    fn test_no_overlap() {
        let page = long_page();
        let parsed = parsed(&[&page]);
        let chunks = TextChunker::new(150, 0).chunk_document(&doc(), &parsed);

        for pair in chunks.windows(2) {
            assert_eq!(pair[1].char_start, pair[0].char_end);
        }
    }

    #[test]
    fn test_page_numbers_and_indices() {
        let parsed = parsed(&["Page one talks about paid leave.", "Page two talks about sick leave."]);
        let chunks = TextChunker::new(1024, 200).chunk_document(&doc(), &parsed);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source.page_number, Some(1));
        assert_eq!(chunks[1].source.page_number, Some(2));
        assert_eq!(chunks[1].source.page_count, Some(2));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[0].source.filename, "policy.pdf");
    }

    #[test]
    fn test_min_size_drops_fragments() {
        let parsed = parsed(&["Tiny.", "This page has enough text to be kept."]);
        let chunks = TextChunker::new(1024, 200).with_min_size(10).chunk_document(&doc(), &parsed);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source.page_number, Some(2));
    }

    #[test]
    fn test_oversize_sentence_kept_whole() {
        let sentence = "word ".repeat(60);
        let parsed = parsed(&[sentence.trim()]);
        let chunks = TextChunker::new(100, 20).chunk_document(&doc(), &parsed);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, sentence.trim());
    }
}
