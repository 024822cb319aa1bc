//! JSON API routes

pub mod documents;
pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload, with a body limit sized for PDFs
        .route(
            "/upload",
            post(ingest::upload_pdf).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", post(query::query))
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(serde_json::json!({
        "name": "pdf-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Ask questions about an uploaded PDF, answered from its most relevant passages",
        "models": {
            "chat": state.llm_provider().model(),
            "embeddings": state.embedding_provider().name(),
            "dimensions": state.embedding_provider().dimensions(),
        },
        "retrieval": {
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap,
            "top_k": config.retrieval.top_k,
        },
        "max_upload_size": config.upload.max_upload_size,
        "endpoints": {
            "POST /api/upload": "Upload a PDF (multipart field \"file\") and index it",
            "POST /api/query": "Ask a question, optionally scoped to one document",
            "GET /api/documents": "List indexed documents",
            "GET /api/documents/:id": "Get document details",
            "DELETE /api/documents/:id": "Remove a document and its chunks"
        }
    }))
}
