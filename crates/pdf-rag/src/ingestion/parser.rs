//! PDF text extraction

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How long the pdf-extract fallback may run before we give up on it
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// The PDF header may appear anywhere in the first 1024 bytes
const HEADER_WINDOW: usize = 1024;

/// Parsed document with extracted text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Extracted text, pages joined with newlines
    pub content: String,
    /// Content hash for deduplication
    pub content_hash: String,
    /// Total pages, when the page tree could be read
    pub total_pages: Option<u32>,
    /// Page-level content
    pub pages: Vec<PageContent>,
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed); `None` when the text could not be split by page
    pub page_number: Option<u32>,
    /// Text content of the page
    pub content: String,
    /// Byte offset in `ParsedDocument::content`
    pub char_offset: usize,
}

/// PDF parser
pub struct FileParser;

impl FileParser {
    /// Reject anything that is not a PDF by name and by header
    pub fn check_pdf(filename: &str, data: &[u8]) -> Result<()> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if extension != "pdf" {
            let shown = if extension.is_empty() { "(none)" } else { extension.as_str() };
            return Err(Error::UnsupportedFileType(format!(
                "{} - only PDF files can be uploaded",
                shown
            )));
        }

        let window = &data[..data.len().min(HEADER_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(Error::UnsupportedFileType(format!(
                "{} does not look like a PDF (missing %PDF- header)",
                filename
            )));
        }

        Ok(())
    }

    /// Parse a PDF staged on disk; `filename` is the name shown to users
    pub fn parse_file(filename: &str, path: &Path) -> Result<ParsedDocument> {
        let data = std::fs::read(path)?;
        Self::parse_pdf(filename, &data)
    }

    /// Parse PDF bytes into page-aware text
    pub fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        Self::check_pdf(filename, data)?;

        let (page_texts, total_pages) = match Self::extract_pages(data) {
            Ok(pages) if pages.iter().any(|(_, text)| !text.trim().is_empty()) => {
                let total = pages.len() as u32;
                let pages = pages
                    .into_iter()
                    .map(|(number, text)| (Some(number), text))
                    .collect::<Vec<_>>();
                (pages, Some(total))
            }
            Ok(pages) => {
                tracing::warn!("lopdf found no text in {}, trying pdf-extract", filename);
                let total = (!pages.is_empty()).then_some(pages.len() as u32);
                (vec![(None, Self::extract_with_timeout(filename, data)?)], total)
            }
            Err(e) => {
                tracing::warn!("lopdf could not read {}: {}, trying pdf-extract", filename, e);
                (vec![(None, Self::extract_with_timeout(filename, data)?)], None)
            }
        };

        let mut content = String::new();
        let mut pages = Vec::with_capacity(page_texts.len());

        for (page_number, raw) in page_texts {
            let text = cleanup_pdf_text(&raw);
            if text.is_empty() {
                continue;
            }
            if !content.is_empty() {
                content.push('\n');
            }
            pages.push(PageContent {
                page_number,
                content: text.clone(),
                char_offset: content.len(),
            });
            content.push_str(&text);
        }

        if content.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF. It may be scanned or image-based.",
            ));
        }

        tracing::debug!(
            "Extracted {} bytes from {} ({} pages with text)",
            content.len(),
            filename,
            pages.len()
        );

        Ok(ParsedDocument {
            content_hash: hash_content(&content),
            content,
            total_pages,
            pages,
        })
    }

    /// Extract text page by page with lopdf
    fn extract_pages(data: &[u8]) -> std::result::Result<Vec<(u32, String)>, lopdf::Error> {
        let doc = lopdf::Document::load_mem(data)?;
        let mut pages = Vec::new();

        for page_number in doc.get_pages().keys().copied() {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages.push((page_number, text)),
                Err(e) => {
                    tracing::debug!("Could not extract text from page {}: {}", page_number, e);
                    pages.push((page_number, String::new()));
                }
            }
        }

        Ok(pages)
    }

    /// Whole-document extraction with pdf-extract on a worker thread.
    ///
    /// pdf-extract can hang on some embedded fonts; the thread cannot be
    /// killed, so on timeout it is left to finish in the background.
    fn extract_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
        });

        match rx.recv_timeout(FALLBACK_TIMEOUT) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::file_parse(filename, e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!("PDF extraction of {} timed out after {:?}", filename, FALLBACK_TIMEOUT);
                Err(Error::Timeout(format!("extracting text from {}", filename)))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::file_parse(filename, "PDF extraction thread crashed"))
            }
        }
    }
}

/// Normalise typographic characters and whitespace in extracted PDF text
fn cleanup_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// SHA-256 of the extracted text, hex encoded
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
