//! Error types for PDF Wizard

use thiserror::Error;

/// Result type alias for PDF Wizard
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PDF Wizard
#[derive(Error, Debug)]
pub enum Error {
    /// Filename escapes the upload directory or is otherwise unsafe
    #[error("Path violation: {filename}")]
    PathViolation { filename: String },

    /// Referenced document does not exist in the upload directory
    #[error("File not found: {filename}")]
    MissingFile { filename: String },

    /// Page out of bounds (1-based)
    #[error("Page {page} out of bounds (total: {total})")]
    InvalidPage { page: i64, total: u32 },

    /// Malformed numeric or textual input
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Malformed page range specification
    #[error("Invalid page range: {range}")]
    InvalidRange { range: String },

    /// Input bytes are not a PDF the engine can work with
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure came from one of the PDF/image engines rather
    /// than from request validation or the filesystem.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidPdf { .. }
                | Error::PasswordRequired
                | Error::Pdfium { .. }
                | Error::QpdfError { .. }
                | Error::Image(_)
        )
    }

    /// Return a sanitized error message safe to show in the panel.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PathViolation { .. } => "Nome de arquivo inválido.".to_string(),
            Error::MissingFile { .. } => "Arquivo não encontrado.".to_string(),
            Error::InvalidPage { .. } => "Página inválida.".to_string(),
            Error::InvalidArgument { reason } => format!("Parâmetro inválido: {}", reason),
            Error::InvalidRange { range } => format!("Intervalo de páginas inválido: {}", range),
            Error::InvalidPdf { .. } => "PDF inválido.".to_string(),
            Error::PasswordRequired => "PDF protegido por senha.".to_string(),
            Error::Pdfium { .. } | Error::QpdfError { .. } => {
                "Falha ao processar o PDF.".to_string()
            }
            Error::Image(_) => "Imagem inválida.".to_string(),
            Error::Io(_) => "Erro de E/S.".to_string(),
        }
    }
}
