//! Server configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Lowest DPI accepted for page rendering
pub const MIN_RENDER_DPI: u16 = 150;

/// Runtime configuration for the PDF Wizard server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Flat directory holding every uploaded and working file
    pub upload_dir: PathBuf,
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// API key handed to the rich-text editor embedded in the panel
    pub editor_api_key: String,
    /// DPI used when rasterizing a page to PNG (never below 150)
    pub render_dpi: u16,
    /// Maximum accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            editor_api_key: "no-api-key".to_string(),
            render_dpi: 180,
            max_upload_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl ServerConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let render_dpi = parse_var("RENDER_DPI", defaults.render_dpi);

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port),
            editor_api_key: env::var("TINYMCE_API_KEY").unwrap_or(defaults.editor_api_key),
            render_dpi: render_dpi.max(MIN_RENDER_DPI),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparseable value, using default {}", default);
            default
        }),
        Err(_) => default,
    }
}
