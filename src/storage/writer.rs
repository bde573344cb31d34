//! Write-temp-then-rename commits for files in the upload directory
//!
//! Every write that lands on a path a reader may observe goes through this
//! module. The new content is written to a sibling `<name>.<uuid>.tmp`, synced,
//! and renamed over the target, so the target holds either the old or the new
//! bytes and never a partial write.

use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix carried by every pending mutation file
pub const TEMP_SUFFIX: &str = ".tmp";

/// Build the colocated temporary path for a target.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| Error::PathViolation {
            filename: target.display().to_string(),
        })?
        .to_string_lossy();

    Ok(target.with_file_name(format!(
        "{}.{}{}",
        name,
        uuid::Uuid::new_v4().simple(),
        TEMP_SUFFIX
    )))
}

/// Atomically replace (or create) `target` with `data`.
pub fn commit_bytes(target: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = temp_path_for(target)?;

    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    if let Err(e) = fs::rename(&tmp_path, target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Read `target`, run `transform` over its bytes and commit the result.
///
/// When the file is missing or `transform` fails nothing is written and the
/// target keeps its previous content.
pub fn apply_mutation<F>(target: &Path, transform: F) -> Result<()>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>>,
{
    let current = read_existing(target)?;
    let updated = transform(&current)?;
    commit_bytes(target, &updated)
}

/// Read a file that is expected to exist, mapping absence to `MissingFile`.
pub fn read_existing(target: &Path) -> Result<Vec<u8>> {
    fs::read(target).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingFile {
            filename: target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        },
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftover_temps(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(TEMP_SUFFIX))
            .collect()
    }

    #[test]
    fn test_commit_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.pdf");

        commit_bytes(&target, b"first").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");

        commit_bytes(&target, b"second version").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second version");
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_apply_mutation_commits_transform_output() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.pdf");
        fs::write(&target, b"abc").unwrap();

        apply_mutation(&target, |data| Ok(data.iter().rev().copied().collect())).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"cba");
    }

    #[test]
    fn test_failed_transform_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.pdf");
        fs::write(&target, b"original bytes").unwrap();

        let result = apply_mutation(&target, |_| {
            Err(Error::QpdfError {
                reason: "corrupt".to_string(),
            })
        });

        assert!(matches!(result, Err(Error::QpdfError { .. })));
        assert_eq!(fs::read(&target).unwrap(), b"original bytes");
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_apply_mutation_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent.pdf");

        let mut called = false;
        let result = apply_mutation(&target, |d| {
            called = true;
            Ok(d.to_vec())
        });

        assert!(matches!(result, Err(Error::MissingFile { filename }) if filename == "absent.pdf"));
        assert!(!called);
        assert!(!target.exists());
    }

    #[test]
    fn test_commit_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nope").join("doc.pdf");

        assert!(matches!(commit_bytes(&target, b"x"), Err(Error::Io(_))));
        assert!(!target.exists());
    }

    #[test]
    fn test_temp_path_is_colocated() {
        let target = Path::new("/srv/uploads/a__current.pdf");
        let tmp = temp_path_for(target).unwrap();
        assert_eq!(tmp.parent(), target.parent());
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("a__current.pdf."));
        assert!(name.ends_with(TEMP_SUFFIX));
    }
}
