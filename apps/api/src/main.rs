mod analysis;
mod config;
mod errors;
mod llm_client;
mod models;
mod object_url;
mod pages;
mod pdf;
mod platform;
mod routes;
mod state;
mod uploader;

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::LlmFeedbackAnalyzer;
use crate::config::{Config, PlatformBackend};
use crate::llm_client::LlmClient;
use crate::object_url::ObjectUrls;
use crate::pdf::{LibraryLoader, PageRasterizer, PdfiumSource};
use crate::platform::Platform;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumind API v{}", env!("CARGO_PKG_VERSION"));

    // Auth, records and files
    let platform = match &config.backend {
        PlatformBackend::Memory => {
            info!("Using in-memory platform; data is lost on restart");
            Platform::in_memory()
        }
        PlatformBackend::Redis(remote) => Platform::connect(remote).await?,
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let analyzer = Arc::new(LlmFeedbackAnalyzer::new(llm));

    // PDFium is bound on the first conversion, not here
    let object_urls = ObjectUrls::default();
    let source = PdfiumSource::new(config.pdfium_library_path.clone().map(PathBuf::from));
    let loader = Arc::new(LibraryLoader::new(Arc::new(source)));
    let rasterizer = Arc::new(PageRasterizer::new(loader, object_urls.clone()));

    // Build app state
    let state = AppState {
        platform,
        rasterizer,
        object_urls,
        analyzer,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
