//! HTTP handlers for the upload flow, the panel pages and the panel API

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::form::PanelForm;
use super::panel;
use super::AppState;
use crate::error::{Error, Result};
use crate::validate::{
    parse_coordinate, parse_degrees, parse_page, parse_width, watermark_text, DEFAULT_IMAGE_X,
    DEFAULT_IMAGE_Y,
};
use crate::workspace::UploadedFile;

// ============================================================================
// Replies and errors
// ============================================================================

/// `{ok, msg}` reply of the mutating panel calls
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub ok: bool,
    pub msg: String,
}

impl StatusReply {
    fn ok(msg: &str) -> Json<Self> {
        Json(Self {
            ok: true,
            msg: msg.to_string(),
        })
    }
}

/// `{ok, text}` reply of text extraction
#[derive(Debug, Serialize, Deserialize)]
pub struct TextReply {
    pub ok: bool,
    pub text: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// A failed panel call, rendered as `{ok: false, msg}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    msg: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            msg: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

/// HTTP status for each error kind
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::PathViolation { .. }
        | Error::InvalidPage { .. }
        | Error::InvalidArgument { .. }
        | Error::InvalidRange { .. } => StatusCode::BAD_REQUEST,
        Error::MissingFile { .. } => StatusCode::NOT_FOUND,
        Error::InvalidPdf { .. }
        | Error::PasswordRequired
        | Error::Pdfium { .. }
        | Error::QpdfError { .. }
        | Error::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            status: status_for(&error),
            msg: error.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(StatusReply {
            ok: false,
            msg: self.msg,
        });
        (self.status, body).into_response()
    }
}

/// Log a failed panel call with full detail and convert it for the client
fn respond<T>(
    operation: &'static str,
    form: &PanelForm,
    result: Result<T>,
) -> std::result::Result<T, ApiError> {
    result.map_err(|e| {
        tracing::warn!(
            operation,
            filename = form.field("filename").unwrap_or_default(),
            error = %e,
            "Panel operation failed"
        );
        ApiError::from(e)
    })
}

fn attachment(name: &str) -> String {
    format!("attachment; filename=\"{}\"", name.replace('"', "_"))
}

// ============================================================================
// Pages
// ============================================================================

/// GET /
pub async fn index() -> Html<String> {
    Html(panel::index_page())
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct PanelQuery {
    filename: Option<String>,
}

/// GET /painel?filename=
pub async fn painel(State(state): State<AppState>, Query(query): Query<PanelQuery>) -> Response {
    let Some(filename) = query.filename.filter(|f| !f.trim().is_empty()) else {
        return Redirect::to("/").into_response();
    };

    match state.workspace.contains(&filename) {
        Ok(true) => Html(panel::panel_page(&filename, &state.config.editor_api_key)).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, Html(panel::not_found_page(&filename))).into_response(),
        Err(e) => {
            tracing::warn!(filename = %filename, error = %e, "Panel requested for invalid name");
            (status_for(&e), Html(panel::not_found_page(&filename))).into_response()
        }
    }
}

/// POST /upload
///
/// Redirects to the panel of the new alias, or back to the index when no
/// usable PDF was sent.
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Redirect {
    let outcome = match multipart {
        Ok(multipart) => receive_upload(&state, multipart).await,
        Err(e) => Err(Error::InvalidArgument {
            reason: e.to_string(),
        }),
    };

    match outcome {
        Ok(alias) => Redirect::to(&format!("/painel?filename={}", urlencoding::encode(&alias))),
        Err(e) => {
            tracing::warn!(error = %e, "Upload rejected");
            Redirect::to("/")
        }
    }
}

async fn receive_upload(state: &AppState, mut multipart: Multipart) -> Result<String> {
    let malformed = |e: axum::extract::multipart::MultipartError| Error::InvalidArgument {
        reason: e.to_string(),
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default();
        if name != "file" && name != "pdf" {
            continue;
        }

        let client_name = field.file_name().unwrap_or_default().to_string();
        if client_name.is_empty() {
            continue;
        }

        let data = field.bytes().await.map_err(malformed)?;
        tracing::debug!(name = %client_name, bytes = data.len(), "Received upload");
        return state.workspace.upload(&client_name, data.to_vec()).await;
    }

    Err(Error::InvalidArgument {
        reason: "no file uploaded".to_string(),
    })
}

/// GET /view/:filename
pub async fn view(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let data = state.workspace.read_document(&filename).await.map_err(|e| {
        tracing::warn!(filename = %filename, error = %e, "View failed");
        ApiError::from(e)
    })?;

    Ok(([(header::CONTENT_TYPE, "application/pdf")], data).into_response())
}

/// GET /download/:filename
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let data = state.workspace.read_document(&filename).await.map_err(|e| {
        tracing::warn!(filename = %filename, error = %e, "Download failed");
        ApiError::from(e)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        data,
    )
        .into_response())
}

// ============================================================================
// Panel API
// ============================================================================

/// POST /api/rotate
pub async fn rotate(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let result = async {
        let filename = form.filename()?;
        let degrees = parse_degrees(form.field("degrees"))?;
        state.workspace.rotate(filename, degrees).await
    }
    .await;

    respond("rotate", &form, result)?;
    Ok(StatusReply::ok("Rotacionado."))
}

/// POST /api/watermark
pub async fn watermark(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let result = async {
        let filename = form.filename()?;
        let text = watermark_text(form.field("text"));
        state.workspace.watermark(filename, &text).await
    }
    .await;

    respond("watermark", &form, result)?;
    Ok(StatusReply::ok("Marca d'água aplicada."))
}

/// POST /api/page_png
pub async fn page_png(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Response, ApiError> {
    let result = async {
        let filename = form.filename()?;
        let page = parse_page(form.field("page"))?;
        state.workspace.render_page(filename, page).await
    }
    .await;

    let png = respond("page_png", &form, result)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&png.download_name)),
        ],
        png.rendered.png,
    )
        .into_response())
}

/// POST /api/insert_image
pub async fn insert_image(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let Some(image) = form.file("image") else {
        tracing::warn!(
            filename = form.field("filename").unwrap_or_default(),
            "insert_image called without an image"
        );
        return Err(ApiError::bad_request("Nenhuma imagem enviada."));
    };

    let result = async {
        let filename = form.filename()?;
        let page = parse_page(form.field("page"))?;
        let x = parse_coordinate("x", form.field("x"), DEFAULT_IMAGE_X)?;
        let y = parse_coordinate("y", form.field("y"), DEFAULT_IMAGE_Y)?;
        let width = parse_width(form.field("w"))?;
        state
            .workspace
            .insert_image(filename, page, x, y, width, image.data.clone())
            .await
    }
    .await;

    respond("insert_image", &form, result)?;
    Ok(StatusReply::ok("Imagem inserida."))
}

/// POST /api/merge
pub async fn merge(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let result = async {
        let filename = form.filename()?;
        let uploads = form
            .files("files")
            .map(|f| UploadedFile {
                name: f.file_name.clone(),
                data: f.data.clone(),
            })
            .collect();
        state.workspace.merge(filename, uploads).await
    }
    .await;

    respond("merge", &form, result)?;
    Ok(StatusReply::ok("Mesclado com sucesso."))
}

/// POST /api/extract_text
pub async fn extract_text(
    State(state): State<AppState>,
    form: PanelForm,
) -> std::result::Result<Json<TextReply>, ApiError> {
    let result = async {
        let filename = form.filename()?;
        state.workspace.extract_text(filename).await
    }
    .await;

    let text = respond("extract_text", &form, result)?;
    Ok(Json(TextReply { ok: true, text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::InvalidPage { page: 9, total: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::PathViolation {
                filename: "../x".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::MissingFile {
                filename: "x.pdf".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::QpdfError {
                reason: "damaged".to_string()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::Io(std::io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_uses_client_message() {
        let err = ApiError::from(Error::InvalidPage { page: 0, total: 3 });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Página inválida.");
    }

    #[test]
    fn test_attachment_header_quotes() {
        assert_eq!(attachment("a_p1.png"), "attachment; filename=\"a_p1.png\"");
        assert_eq!(attachment("we\"ird.pdf"), "attachment; filename=\"we_ird.pdf\"");
    }
}
