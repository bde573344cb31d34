//! Document operations over the upload directory
//!
//! A [`Workspace`] ties path resolution, aliases, per-alias locking and the
//! PDF engines together. Every mutation follows the same sequence: resolve
//! the name, take the alias lock, then read, transform and commit on a
//! blocking thread.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::pdf::{
    extract_page_texts, format_extracted_text, normalize_image, place_image, render_page_png,
    stamp_watermark, ImagePlacement, QpdfWrapper, RenderedPage,
};
use crate::storage::{
    alias_name, apply_mutation, commit_bytes, pdf_stem, read_existing, sanitize_filename, AliasLocks,
    AliasManager, PathResolver,
};
use crate::validate::{check_page, is_pdf_filename};

/// An uploaded file handed to [`Workspace::merge`]
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side filename, only used to filter on the extension
    pub name: String,
    pub data: Vec<u8>,
}

/// A page rendered for download
#[derive(Debug, Clone)]
pub struct PagePng {
    /// Suggested attachment name, `<stem>_p<N>.png`
    pub download_name: String,
    pub rendered: RenderedPage,
}

/// Run engine work off the async runtime
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })?
}

/// Operations on the documents of one upload directory
pub struct Workspace {
    resolver: PathResolver,
    aliases: AliasManager,
    locks: AliasLocks,
    render_dpi: u16,
}

impl Workspace {
    pub fn new(config: &ServerConfig) -> Self {
        let resolver = PathResolver::new(config.upload_dir.clone());
        Self {
            aliases: AliasManager::new(resolver.clone()),
            resolver,
            locks: AliasLocks::new(),
            render_dpi: config.render_dpi,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Whether `filename` names an existing document
    pub fn contains(&self, filename: &str) -> Result<bool> {
        Ok(self.resolver.resolve(filename)?.is_file())
    }

    /// Persist an upload under its sanitized name and refresh its alias.
    ///
    /// # Returns
    /// The alias name the panel should edit
    pub async fn upload(&self, client_name: &str, data: Vec<u8>) -> Result<String> {
        let original = sanitize_filename(client_name).ok_or_else(|| Error::PathViolation {
            filename: client_name.to_string(),
        })?;

        if !is_pdf_filename(&original) {
            return Err(Error::InvalidArgument {
                reason: format!("not a .pdf file: {}", original),
            });
        }
        if !data.starts_with(b"%PDF") {
            return Err(Error::InvalidPdf {
                reason: "missing %PDF header".to_string(),
            });
        }

        let target = self.resolver.resolve(&original)?;
        let alias_key = alias_name(&original);
        // The upload may itself be some other document's alias
        let guards = self.locks.acquire_all(&[original.as_str(), alias_key.as_str()]).await;

        let aliases = self.aliases.clone();
        let name = original.clone();
        let size = data.len();
        let alias = run_blocking(move || {
            let result = commit_bytes(&target, &data).and_then(|()| aliases.register(&name));
            drop(guards);
            result
        })
        .await?;

        tracing::info!(original = %original, alias = %alias, bytes = size, "Upload stored");
        Ok(alias)
    }

    /// Current committed bytes of a document
    pub async fn read_document(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolver.resolve(filename)?;
        run_blocking(move || read_existing(&path)).await
    }

    /// Read-transform-commit under the alias lock
    async fn mutate<F>(&self, filename: &str, operation: &'static str, transform: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>> + Send + 'static,
    {
        let target = self.resolver.resolve(filename)?;
        let guard = self.locks.acquire(filename).await;

        // The guard travels with the blocking task so a dropped request
        // cannot release the alias while the commit is still running.
        run_blocking(move || {
            let result = apply_mutation(&target, transform);
            drop(guard);
            result
        })
        .await?;

        tracing::info!(filename, operation, "Document updated");
        Ok(())
    }

    /// Rotate every page by `degrees` (a signed multiple of 90)
    pub async fn rotate(&self, filename: &str, degrees: i32) -> Result<()> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidArgument {
                reason: format!("degrees must be a multiple of 90, got {}", degrees),
            });
        }
        self.mutate(filename, "rotate", move |data| {
            QpdfWrapper::rotate(data, degrees)
        })
        .await
    }

    /// Stamp `text` diagonally across every page
    pub async fn watermark(&self, filename: &str, text: &str) -> Result<()> {
        let text = text.to_string();
        self.mutate(filename, "watermark", move |data| stamp_watermark(data, &text))
            .await
    }

    /// Place an uploaded image on one page
    pub async fn insert_image(
        &self,
        filename: &str,
        page: i64,
        x: f32,
        y: f32,
        width: f32,
        image: Vec<u8>,
    ) -> Result<()> {
        if image.is_empty() {
            return Err(Error::InvalidArgument {
                reason: "no image uploaded".to_string(),
            });
        }

        self.mutate(filename, "insert_image", move |data| {
            let total = QpdfWrapper::get_page_count(data, None)?;
            let placement = ImagePlacement {
                page: check_page(page, total)?,
                x,
                y,
                width,
            };
            let png = normalize_image(&image)?;
            place_image(data, &placement, &png)
        })
        .await
    }

    /// Append the pages of every `.pdf` upload, in upload order.
    ///
    /// Uploads without a `.pdf` name are skipped. Any `.pdf` upload that does
    /// not parse fails the whole merge with the document unchanged.
    ///
    /// # Returns
    /// The number of documents appended
    pub async fn merge(&self, filename: &str, uploads: Vec<UploadedFile>) -> Result<usize> {
        let inputs: Vec<Vec<u8>> = uploads
            .into_iter()
            .filter(|upload| {
                let keep = is_pdf_filename(&upload.name);
                if !keep {
                    tracing::debug!(name = %upload.name, "Skipping non-PDF merge input");
                }
                keep
            })
            .map(|upload| upload.data)
            .collect();

        if inputs.is_empty() {
            // Nothing to append, but the target must still exist
            self.read_document(filename).await?;
            return Ok(0);
        }

        let count = inputs.len();
        self.mutate(filename, "merge", move |data| {
            let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            QpdfWrapper::append(data, &refs)
        })
        .await?;

        Ok(count)
    }

    /// Rasterize one page at the configured DPI
    pub async fn render_page(&self, filename: &str, page: i64) -> Result<PagePng> {
        let path = self.resolver.resolve(filename)?;
        let dpi = self.render_dpi;

        let rendered = run_blocking(move || {
            let data = read_existing(&path)?;
            let total = QpdfWrapper::get_page_count(&data, None)?;
            let page = check_page(page, total)?;
            render_page_png(&data, page, dpi)
        })
        .await?;

        Ok(PagePng {
            download_name: format!("{}_p{}.png", pdf_stem(filename), rendered.page),
            rendered,
        })
    }

    /// Text of every page with `// Página <n>` markers
    pub async fn extract_text(&self, filename: &str) -> Result<String> {
        let path = self.resolver.resolve(filename)?;
        run_blocking(move || {
            let data = read_existing(&path)?;
            let pages = extract_page_texts(&data)?;
            Ok(format_extracted_text(&pages))
        })
        .await
    }

    /// Write the pages selected by `ranges` to `<stem>_split.pdf`
    ///
    /// # Returns
    /// The name of the derived file
    pub async fn split(&self, filename: &str, ranges: &str) -> Result<String> {
        let ranges = ranges.to_string();
        self.derive(filename, "split", move |data| {
            QpdfWrapper::split_pages(data, &ranges)
        })
        .await
    }

    /// Write an AES-256 encrypted copy to `<stem>_protected.pdf`
    ///
    /// # Returns
    /// The name of the derived file
    pub async fn protect(&self, filename: &str, password: &str) -> Result<String> {
        let password = password.to_string();
        self.derive(filename, "protected", move |data| {
            QpdfWrapper::encrypt(data, &password)
        })
        .await
    }

    /// Transform a document into a new sibling file `<stem>_<suffix>.pdf`
    async fn derive<F>(&self, filename: &str, suffix: &'static str, transform: F) -> Result<String>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>> + Send + 'static,
    {
        let source = self.resolver.resolve(filename)?;
        let output = format!("{}_{}.pdf", pdf_stem(filename), suffix);
        let target = self.resolver.resolve(&output)?;
        let guard = self.locks.acquire(&output).await;

        run_blocking(move || {
            let result = read_existing(&source)
                .and_then(|data| transform(&data))
                .and_then(|derived| commit_bytes(&target, &derived));
            drop(guard);
            result
        })
        .await?;

        tracing::info!(filename, output = %output, "Derived document written");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace(dir: &std::path::Path) -> Workspace {
        Workspace::new(&ServerConfig {
            upload_dir: dir.to_path_buf(),
            ..ServerConfig::default()
        })
    }

    #[tokio::test]
    async fn test_upload_sanitizes_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        let alias = ws
            .upload("../My Report.PDF", b"%PDF-1.4 body".to_vec())
            .await
            .unwrap();

        assert_eq!(alias, "My_Report__current.pdf");
        assert_eq!(fs::read(dir.path().join("My_Report.PDF")).unwrap(), b"%PDF-1.4 body");
        assert_eq!(fs::read(dir.path().join(&alias)).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_upload_over_live_alias_waits_for_its_lock() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("book__current.pdf"), b"%PDF-1.4 live").unwrap();
        let ws = workspace(dir.path());

        let held = ws.locks.acquire("book__current.pdf").await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            ws.upload("book__current.pdf", b"%PDF-1.4 replaced".to_vec()),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(
            fs::read(dir.path().join("book__current.pdf")).unwrap(),
            b"%PDF-1.4 live"
        );

        drop(held);
        let alias = ws
            .upload("book__current.pdf", b"%PDF-1.4 replaced".to_vec())
            .await
            .unwrap();
        assert_eq!(alias, "book__current__current.pdf");
        assert_eq!(
            fs::read(dir.path().join("book__current.pdf")).unwrap(),
            b"%PDF-1.4 replaced"
        );
        assert!(ws.locks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_extension_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        assert!(matches!(
            ws.upload("notes.txt", b"%PDF-1.4".to_vec()).await,
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            ws.upload("fake.pdf", b"GIF89a".to_vec()).await,
            Err(Error::InvalidPdf { .. })
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rotate_rejects_bad_degrees_before_resolving() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        assert!(matches!(
            ws.rotate("missing__current.pdf", 45).await,
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_operations_reject_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        assert!(matches!(
            ws.rotate("../../etc/passwd", 90).await,
            Err(Error::PathViolation { .. })
        ));
        assert!(matches!(
            ws.extract_text("../../etc/passwd").await,
            Err(Error::PathViolation { .. })
        ));
        assert!(matches!(
            ws.contains("../secret.pdf"),
            Err(Error::PathViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_merge_without_pdf_inputs_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a__current.pdf"), b"%PDF-1.4 untouched").unwrap();
        let ws = workspace(dir.path());

        let merged = ws
            .merge(
                "a__current.pdf",
                vec![UploadedFile {
                    name: "photo.png".to_string(),
                    data: b"\x89PNG".to_vec(),
                }],
            )
            .await
            .unwrap();

        assert_eq!(merged, 0);
        assert_eq!(
            fs::read(dir.path().join("a__current.pdf")).unwrap(),
            b"%PDF-1.4 untouched"
        );
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        assert!(matches!(
            ws.watermark("ghost__current.pdf", "x").await,
            Err(Error::MissingFile { .. })
        ));
        assert!(!ws.contains("ghost__current.pdf").unwrap());
    }
}
