//! PDF upload endpoint

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::{DocumentSummary, IngestResponse};

/// Multipart field carrying the PDF
pub const UPLOAD_FIELD: &str = "file";

/// POST /api/upload - Upload, extract and index one PDF
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let (filename, data) = read_upload(multipart).await?;

    tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());

    let outcome = state.ingest_pdf(&filename, &data).await?;
    let document = outcome.document();

    Ok(Json(IngestResponse {
        document: DocumentSummary::from(document),
        already_indexed: !outcome.is_new(),
        chunks_created: if outcome.is_new() { document.total_chunks } else { 0 },
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Read the uploaded file from a multipart body, skipping unrelated fields
pub async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.to_string())
            .ok_or_else(|| Error::InvalidRequest("Uploaded file has no filename".to_string()))?;

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.is_empty() {
            return Err(Error::InvalidRequest(format!("{} is empty", filename)));
        }

        return Ok((filename, data));
    }

    Err(Error::InvalidRequest(format!(
        "No file uploaded (expected multipart field \"{}\")",
        UPLOAD_FIELD
    )))
}

fn multipart_error(e: MultipartError) -> Error {
    Error::InvalidRequest(format!("Failed to read upload: {}", e.body_text()))
}
