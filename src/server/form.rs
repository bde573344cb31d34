//! Panel form bodies
//!
//! The panel posts `multipart/form-data` whenever a file is attached and
//! plain urlencoded forms otherwise; [`PanelForm`] accepts both.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form,
};
use std::collections::HashMap;

use super::handlers::ApiError;
use crate::error::Result;
use crate::validate::require_filename;

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub struct FormFile {
    /// Form field the file was sent under
    pub field: String,
    /// Client-side filename
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Text fields and file parts of one panel request
#[derive(Debug, Default)]
pub struct PanelForm {
    fields: HashMap<String, String>,
    files: Vec<FormFile>,
}

impl PanelForm {
    /// Value of a text field, if sent
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The document the request operates on
    pub fn filename(&self) -> Result<&str> {
        require_filename(self.field("filename"))
    }

    /// First file sent under `field`
    pub fn file(&self, field: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// Every file sent under `field`, in submission order
    pub fn files(&self, field: &str) -> impl Iterator<Item = &FormFile> + '_ {
        let field = field.to_string();
        self.files.iter().filter(move |f| f.field == field)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for PanelForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Rejected form body");
                    ApiError::bad_request("Formulário inválido.")
                })?;
            return Ok(Self {
                fields,
                files: Vec::new(),
            });
        }

        let multipart_error = |e: &dyn std::fmt::Display| {
            tracing::warn!(error = %e, "Rejected multipart body");
            ApiError::bad_request("Formulário inválido.")
        };

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| multipart_error(&e))?;

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await.map_err(|e| multipart_error(&e))?;
                    // Browsers send an empty part for an untouched file input
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.push(FormFile {
                        field: name,
                        file_name,
                        data: data.to_vec(),
                    });
                }
                None => {
                    let text = field.text().await.map_err(|e| multipart_error(&e))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    const BOUNDARY: &str = "panel-boundary";

    fn multipart_request(body: String) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/merge")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_urlencoded_fields() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/rotate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("filename=doc__current.pdf&degrees=-90"))
            .unwrap();

        let form = PanelForm::from_request(req, &()).await.unwrap();

        assert_eq!(form.filename().unwrap(), "doc__current.pdf");
        assert_eq!(form.field("degrees"), Some("-90"));
        assert!(form.file("image").is_none());
    }

    #[tokio::test]
    async fn test_multipart_fields_and_files() {
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"filename\"\r\n\r\n\
             doc__current.pdf\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"a.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             AAA\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"b.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             BBB\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \r\n\
             --{b}--\r\n",
            b = BOUNDARY
        );

        let form = PanelForm::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert_eq!(form.filename().unwrap(), "doc__current.pdf");
        let names: Vec<&str> = form.files("files").map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
        assert_eq!(form.file("files").unwrap().data, b"AAA");
        assert!(form.file("image").is_none());
    }

    #[tokio::test]
    async fn test_missing_filename() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/rotate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("degrees=90"))
            .unwrap();

        let form = PanelForm::from_request(req, &()).await.unwrap();
        assert!(form.filename().is_err());
    }
}
