//! Filename to on-disk path resolution for the upload directory

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Maps logical filenames to paths confined to a single upload directory.
///
/// Resolution is a pure function of the configured directory and the input;
/// it never touches the filesystem.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// The upload directory all resolved paths live in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a flat filename inside the upload directory.
    ///
    /// Rejects anything that is not a single normal path component: empty
    /// names, separators of either flavour, `.`/`..`, absolute or prefixed
    /// paths, and NUL bytes.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let violation = || Error::PathViolation {
            filename: filename.to_string(),
        };

        if filename.is_empty()
            || filename.contains('\0')
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains(':')
        {
            return Err(violation());
        }

        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => {
                Ok(self.root.join(name))
            }
            _ => Err(violation()),
        }
    }
}

/// Reduce a client-supplied filename to a safe ASCII form suitable for
/// first persistence.
///
/// Any directory prefix is dropped, whitespace runs become `_`, characters
/// outside `[A-Za-z0-9._-]` are removed and leading dots/underscores are
/// stripped. Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_resolve_plain_name() {
        let resolver = PathResolver::new("/srv/uploads");
        let path = resolver.resolve("report__current.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/srv/uploads/report__current.pdf"));
    }

    #[rstest]
    #[case("../../etc/passwd")]
    #[case("..")]
    #[case(".")]
    #[case("")]
    #[case("/etc/passwd")]
    #[case("sub/file.pdf")]
    #[case("..\\windows\\system.ini")]
    #[case("C:evil.pdf")]
    #[case("file\0.pdf")]
    fn test_resolve_rejects_unsafe_names(#[case] filename: &str) {
        let resolver = PathResolver::new("/srv/uploads");
        assert!(matches!(
            resolver.resolve(filename),
            Err(Error::PathViolation { .. })
        ));
    }

    #[test]
    fn test_resolve_does_not_require_existence() {
        let resolver = PathResolver::new("/nonexistent/dir");
        assert!(resolver.resolve("missing.pdf").is_ok());
    }

    #[rstest]
    #[case("My Report.pdf", Some("My_Report.pdf"))]
    #[case("../../etc/passwd", Some("passwd"))]
    #[case("C:\\Users\\me\\scan 01.PDF", Some("scan_01.PDF"))]
    #[case(".hidden.pdf", Some("hidden.pdf"))]
    #[case("relatório final.pdf", Some("relatrio_final.pdf"))]
    #[case("...", None)]
    #[case("", None)]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(sanitize_filename(input).as_deref(), expected);
    }
}
