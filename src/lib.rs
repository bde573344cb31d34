//! PDF Wizard Library
//!
//! Web panel for editing an uploaded PDF in place:
//! - `upload`: store a PDF and open its `<stem>__current.pdf` working copy
//! - `rotate`, `watermark`, `insert_image`, `merge`: mutate the working copy
//! - `render_page`, `extract_text`: read-only views of the working copy
//! - `split`, `protect`: write derived documents next to the source

pub mod config;
pub mod error;
pub mod pdf;
pub mod server;
pub mod storage;
pub mod validate;
pub mod workspace;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use server::{router, run_server, run_server_with_config, AppState};
pub use workspace::{PagePng, UploadedFile, Workspace};
