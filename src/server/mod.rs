//! HTTP server for the PDF Wizard panel

mod form;
mod handlers;
mod panel;

pub use form::{FormFile, PanelForm};
pub use handlers::{status_for, ApiError, StatusReply, TextReply};

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::workspace::Workspace;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Workspace>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            workspace: Arc::new(Workspace::new(&config)),
            config: Arc::new(config),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/painel", get(handlers::painel))
        .route("/view/:filename", get(handlers::view))
        .route("/download/:filename", get(handlers::download))
        .route("/api/rotate", post(handlers::rotate))
        .route("/api/watermark", post(handlers::watermark))
        .route("/api/page_png", post(handlers::page_png))
        .route("/api/insert_image", post(handlers::insert_image))
        .route("/api/merge", post(handlers::merge))
        .route("/api/extract_text", post(handlers::extract_text))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server with configuration taken from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::from_env()).await
}

/// Run the server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;

    let addr = config.bind_addr();
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        render_dpi = config.render_dpi,
        "Serving documents"
    );

    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("PDF Wizard listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
