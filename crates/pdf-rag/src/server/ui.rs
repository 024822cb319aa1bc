//! Server-rendered browser pages

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::routes::ingest::read_upload;
use crate::server::state::{AppState, IngestOutcome};
use crate::types::{response::DocumentSummary, Document, QueryRequest, QueryResponse};

const HEADER: &str = include_str!("../../templates/header.hbs");
const FOOTER: &str = include_str!("../../templates/footer.hbs");
const INDEX: &str = include_str!("../../templates/index.hbs");
const DOCUMENT: &str = include_str!("../../templates/document.hbs");
const ERROR: &str = include_str!("../../templates/error.hbs");

/// Register the page templates and their shared partials
pub fn templates() -> Result<Handlebars<'static>> {
    let mut hb = Handlebars::new();

    for (name, source) in [("header", HEADER), ("footer", FOOTER)] {
        hb.register_partial(name, source)
            .map_err(|e| Error::internal(format!("Failed to register partial {}: {}", name, e)))?;
    }
    for (name, source) in [("index", INDEX), ("document", DOCUMENT), ("error", ERROR)] {
        hb.register_template_string(name, source)
            .map_err(|e| Error::internal(format!("Failed to register template {}: {}", name, e)))?;
    }

    Ok(hb)
}

/// Browser routes
pub fn ui_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents/:id", get(document))
        .route("/documents/:id/ask", post(ask))
}

#[derive(Debug, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

/// GET / - Upload form and indexed documents
async fn index(State(state): State<AppState>) -> Response {
    let config = state.config();
    let documents: Vec<DocumentSummary> = state
        .list_documents()
        .iter()
        .map(DocumentSummary::from)
        .collect();

    let data = page_data(
        &state,
        json!({
            "sample_pdf_url": config.ui.sample_pdf_url,
            "max_upload_mb": config.upload.max_upload_size / (1024 * 1024),
            "documents": documents,
        }),
    );
    render(&state, "index", &data, "/")
}

/// POST /upload - Index the PDF, then show its question page
async fn upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    match ingest_upload(&state, multipart).await {
        Ok(outcome) => {
            Redirect::to(&format!("/documents/{}", outcome.document().id)).into_response()
        }
        Err(e) => error_page(&state, e, "/"),
    }
}

async fn ingest_upload(state: &AppState, multipart: Multipart) -> Result<IngestOutcome> {
    let (filename, data) = read_upload(multipart).await?;
    tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());
    state.ingest_pdf(&filename, &data).await
}

/// GET /documents/:id - Question form for one document
async fn document(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.get_document(&id) {
        Some(doc) => render_document(&state, &doc, "", None),
        None => error_page(&state, Error::DocumentNotFound(id.to_string()), "/"),
    }
}

/// POST /documents/:id/ask - Answer a question about one document
async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<AskForm>,
) -> Response {
    let Some(doc) = state.get_document(&id) else {
        return error_page(&state, Error::DocumentNotFound(id.to_string()), "/");
    };

    let question = form.question.trim();
    if question.is_empty() {
        return render_document(&state, &doc, "", None);
    }

    match state.query(&QueryRequest::new(question).for_document(id)).await {
        Ok(response) => render_document(&state, &doc, question, Some(&response)),
        Err(e) => error_page(&state, e, &format!("/documents/{}", id)),
    }
}

fn render_document(
    state: &AppState,
    doc: &Document,
    question: &str,
    answer: Option<&QueryResponse>,
) -> Response {
    let answer = answer.map(|response| {
        let citations: Vec<Value> = response
            .citations
            .iter()
            .map(|c| {
                json!({
                    "filename": c.filename,
                    "page_number": c.page_number,
                    "similarity": format!("{:.3}", c.similarity_score),
                    "snippet_highlighted": c.snippet_highlighted,
                })
            })
            .collect();
        json!({
            "answer": response.answer,
            "citations": citations,
            "processing_time_ms": response.processing_time_ms,
        })
    });

    let data = page_data(
        state,
        json!({
            "document": DocumentSummary::from(doc),
            "question": question,
            "example_questions": state.config().ui.example_questions,
            "answer": answer,
        }),
    );
    render(state, "document", &data, &format!("/documents/{}", doc.id))
}

/// Add the fields every page needs to `fields`
fn page_data(state: &AppState, mut fields: Value) -> Value {
    if let Value::Object(map) = &mut fields {
        map.insert("title".to_string(), json!(state.config().ui.title));
        map.insert("version".to_string(), json!(env!("CARGO_PKG_VERSION")));
    }
    fields
}

fn render(state: &AppState, template: &str, data: &Value, back: &str) -> Response {
    match state.templates().render(template, data) {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_page(
            state,
            Error::internal(format!("Failed to render {}: {}", template, e)),
            back,
        ),
    }
}

/// Render `err` as an HTML page carrying the error's status code
fn error_page(state: &AppState, err: Error, back: &str) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("Page request failed: {}", err);
    } else {
        tracing::info!("Page request rejected: {}", err);
    }

    let data = page_data(
        state,
        json!({
            "status": status.to_string(),
            "message": err.to_string(),
            "back": back,
        }),
    );

    match state.templates().render("error", &data) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page: {}", e);
            (status, err.to_string()).into_response()
        }
    }
}
