//! PDF question-answering server binary
//!
//! Run with: OPENAI_API_KEY=sk-... cargo run -p pdf-rag --bin pdf-rag-server

use clap::Parser;
use pdf_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "pdf-rag-server", version, about = "Upload a PDF and ask questions about it")]
struct Args {
    /// Configuration file (defaults to <config dir>/pdf-rag/config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     RAG Over PDFs                         ║
║          Ask Questions on an Uploaded Document            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Top k: {}", config.retrieval.top_k);

    let server = RagServer::new(config)?;

    tracing::info!("Checking API at {}...", server.state().config().llm.base_url);
    match server.state().llm_provider().health_check().await {
        Ok(true) => tracing::info!("API is reachable"),
        Ok(false) => tracing::warn!("API answered but reported an error; check the API key"),
        Err(e) => tracing::warn!("API not reachable: {}", e),
    }

    println!("\nServer starting...");
    println!("  Web UI: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/upload    - Upload a PDF");
    println!("  POST /api/query     - Ask a question");
    println!("  GET  /api/documents - List documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
