//! PDF Wizard - Entry point
//!
//! Serves the upload page and the editing panel over HTTP.

use pdf_wizard::{pdf, run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_wizard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF Wizard v{}", env!("CARGO_PKG_VERSION"));

    if !pdf::pdfium_available() {
        tracing::warn!(
            "PDFium library not found; watermark, image insertion, rendering and text extraction will fail"
        );
    }

    run_server_with_config(ServerConfig::from_env()).await
}
