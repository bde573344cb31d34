//! Working-copy aliases for uploaded documents

use crate::error::Result;
use crate::storage::{commit_bytes, read_existing, PathResolver};

/// Token inserted between the stem and the extension of every alias
pub const ALIAS_SUFFIX: &str = "__current";

/// Derive the working alias for an uploaded filename.
///
/// `report.pdf` and `report.PDF` both map to `report__current.pdf`; a name
/// without a `.pdf` extension keeps its full text as the stem.
pub fn alias_name(original: &str) -> String {
    format!("{}{}.pdf", pdf_stem(original), ALIAS_SUFFIX)
}

/// Strip a trailing `.pdf` (any case) from a filename.
pub fn pdf_stem(filename: &str) -> &str {
    let len = filename.len();
    if len > 4
        && filename.is_char_boundary(len - 4)
        && filename[len - 4..].eq_ignore_ascii_case(".pdf")
    {
        &filename[..len - 4]
    } else {
        filename
    }
}

/// Creates and refreshes `<stem>__current.pdf` aliases.
#[derive(Debug, Clone)]
pub struct AliasManager {
    resolver: PathResolver,
}

impl AliasManager {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Copy the saved upload `original` onto its alias and return the alias
    /// name. Repeated uploads of the same name overwrite the same alias.
    ///
    /// The copy is committed with a rename, so the alias is either absent,
    /// the previous version, or the full new copy.
    pub fn register(&self, original: &str) -> Result<String> {
        let alias = alias_name(original);
        let source = self.resolver.resolve(original)?;
        let target = self.resolver.resolve(&alias)?;

        let data = read_existing(&source)?;
        commit_bytes(&target, &data)?;

        tracing::debug!(original, alias = %alias, bytes = data.len(), "Alias registered");
        Ok(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;

    #[test]
    fn test_alias_name() {
        assert_eq!(alias_name("report.pdf"), "report__current.pdf");
        assert_eq!(alias_name("Scan.PDF"), "Scan__current.pdf");
        assert_eq!(alias_name("a.b.pdf"), "a.b__current.pdf");
        assert_eq!(alias_name("noext"), "noext__current.pdf");
    }

    #[test]
    fn test_pdf_stem() {
        assert_eq!(pdf_stem("x__current.pdf"), "x__current");
        assert_eq!(pdf_stem(".pdf"), ".pdf");
        assert_eq!(pdf_stem("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("book.pdf"), b"%PDF-1.4 v1").unwrap();
        let manager = AliasManager::new(PathResolver::new(dir.path()));

        let first = manager.register("book.pdf").unwrap();
        let second = manager.register("book.pdf").unwrap();

        assert_eq!(first, "book__current.pdf");
        assert_eq!(first, second);
        assert_eq!(
            fs::read(dir.path().join(&first)).unwrap(),
            b"%PDF-1.4 v1"
        );
    }

    #[test]
    fn test_register_last_upload_wins() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AliasManager::new(PathResolver::new(dir.path()));

        fs::write(dir.path().join("book.pdf"), b"%PDF-1.4 old").unwrap();
        manager.register("book.pdf").unwrap();
        fs::write(dir.path().join("book.pdf"), b"%PDF-1.4 new upload").unwrap();
        let alias = manager.register("book.pdf").unwrap();

        assert_eq!(
            fs::read(dir.path().join(alias)).unwrap(),
            b"%PDF-1.4 new upload"
        );
    }

    #[test]
    fn test_register_missing_upload_creates_no_alias() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AliasManager::new(PathResolver::new(dir.path()));

        let result = manager.register("ghost.pdf");

        assert!(matches!(result, Err(Error::MissingFile { .. })));
        assert!(!dir.path().join("ghost__current.pdf").exists());
    }
}
