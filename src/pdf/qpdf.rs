//! qpdf FFI wrapper for page-tree manipulation
//!
//! Rotation, merging, splitting, encryption and page counting all operate on
//! the document structure only, so they go through the qpdf crate (vendored
//! FFI) rather than PDFium.

use crate::error::{Error, Result};
use qpdf::{
    EncryptionParams, EncryptionParamsR6, PrintPermission, QPdf, QPdfDictionary, QPdfScalar,
};

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Inherited attributes are looked up at most this many levels up the page tree
const MAX_TREE_DEPTH: usize = 64;

/// Parse a split specification such as `"1-3,5,7-8"` into 1-indexed page
/// numbers, in the order given.
///
/// Each comma-separated token is either a single page or an inclusive
/// ascending range. Duplicates are kept, since a split may legitimately
/// repeat a page. Non-numeric tokens, empty tokens and descending ranges are
/// `InvalidRange`; pages outside `1..=num_pages` are `InvalidPage`.
pub fn parse_split_ranges(range: &str, num_pages: u32) -> Result<Vec<u32>> {
    let invalid = || Error::InvalidRange {
        range: range.to_string(),
    };

    if range.trim().is_empty() {
        return Err(invalid());
    }

    let mut pages = Vec::new();

    for part in range.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid());
        }

        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_page_token(start, range)?, parse_page_token(end, range)?),
            None => {
                let page = parse_page_token(part, range)?;
                (page, page)
            }
        };

        if start > end {
            return Err(invalid());
        }

        for page in [start, end] {
            if page == 0 || page > num_pages {
                return Err(Error::InvalidPage {
                    page: page as i64,
                    total: num_pages,
                });
            }
        }

        pages.extend(start..=end);
    }

    Ok(pages)
}

fn parse_page_token(token: &str, range: &str) -> Result<u32> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidRange {
            range: range.to_string(),
        });
    }
    token.parse().map_err(|_| Error::InvalidRange {
        range: range.to_string(),
    })
}

/// Helper: open a QPdf from memory, optionally with password
fn open_qpdf(data: &[u8], password: Option<&str>) -> Result<QPdf> {
    match password {
        Some(pwd) => QPdf::read_from_memory_encrypted(data, pwd).map_err(map_qpdf_error),
        None => QPdf::read_from_memory(data).map_err(map_qpdf_error),
    }
}

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword => Error::PasswordRequired,
        _ => Error::QpdfError {
            reason: e.to_string(),
        },
    }
}

/// Effective `/Rotate` of a page, following `/Parent` links for the
/// inherited value.
fn effective_rotation(page: &QPdfDictionary) -> i64 {
    let mut rotate = page.get("/Rotate");
    let mut parent = page.get("/Parent");
    let mut depth = 0;

    while rotate.is_none() && depth < MAX_TREE_DEPTH {
        let Some(node) = parent else {
            break;
        };
        let node = QPdfDictionary::from(node);
        rotate = node.get("/Rotate");
        parent = node.get("/Parent");
        depth += 1;
    }

    rotate.map(|r| QPdfScalar::from(r).as_i64()).unwrap_or(0)
}

impl QpdfWrapper {
    /// Extract specific pages from a PDF, in the order given by `pages`
    /// (see [`parse_split_ranges`]).
    ///
    /// # Returns
    /// The extracted pages as a new PDF in bytes
    pub fn split_pages(input_data: &[u8], pages: &str) -> Result<Vec<u8>> {
        let source = open_qpdf(input_data, None)?;
        let num_pages = source.get_num_pages().map_err(map_qpdf_error)?;

        let page_numbers = parse_split_ranges(pages, num_pages)?;

        let dest = QPdf::empty();

        for &page_num in &page_numbers {
            let page = source
                .get_page(page_num - 1)
                .ok_or(Error::InvalidPage {
                    page: page_num as i64,
                    total: num_pages,
                })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Append the pages of every input after the pages of `base`.
    ///
    /// The base document keeps its catalog; inputs contribute pages only, in
    /// the order given and in their own page order.
    ///
    /// # Returns
    /// The merged PDF as bytes
    pub fn append(base: &[u8], inputs: &[&[u8]]) -> Result<Vec<u8>> {
        let dest = open_qpdf(base, None)?;

        // Foreign stream data is only read at write time, so every source
        // must outlive the writer.
        let mut sources = Vec::with_capacity(inputs.len());

        for (i, input_data) in inputs.iter().enumerate() {
            let source = QPdf::read_from_memory(input_data).map_err(|e| Error::QpdfError {
                reason: format!("Failed to read input PDF {}: {}", i, e),
            })?;

            let pages = source.get_pages().map_err(|e| Error::QpdfError {
                reason: format!("Failed to get pages from input PDF {}: {}", i, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(map_qpdf_error)?;
            }

            sources.push(source);
        }

        let output = dest.writer().write_to_memory().map_err(map_qpdf_error);
        drop(sources);
        output
    }

    /// Rotate every page by `degrees` (a multiple of 90, may be negative).
    ///
    /// The new value is written on each page and normalized into `0..360`.
    pub fn rotate(input_data: &[u8], degrees: i32) -> Result<Vec<u8>> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidArgument {
                reason: format!("rotation must be a multiple of 90, got {}", degrees),
            });
        }

        let qpdf = open_qpdf(input_data, None)?;
        let pages = qpdf.get_pages().map_err(map_qpdf_error)?;

        for page in &pages {
            let current = effective_rotation(page);
            let updated = (current + degrees as i64).rem_euclid(360);
            page.set("/Rotate", qpdf.new_integer(updated));
        }

        qpdf.writer().write_to_memory().map_err(map_qpdf_error)
    }

    /// Effective rotation of every page, in degrees within `0..360`
    pub fn page_rotations(input_data: &[u8]) -> Result<Vec<i32>> {
        let qpdf = open_qpdf(input_data, None)?;
        let pages = qpdf.get_pages().map_err(map_qpdf_error)?;

        Ok(pages
            .iter()
            .map(|page| effective_rotation(page).rem_euclid(360) as i32)
            .collect())
    }

    /// Encrypt a PDF with 256-bit AES; the password both opens the document
    /// and guards its permissions.
    ///
    /// # Returns
    /// The encrypted PDF as bytes
    pub fn encrypt(input_data: &[u8], password: &str) -> Result<Vec<u8>> {
        if password.is_empty() {
            return Err(Error::InvalidArgument {
                reason: "password must not be empty".to_string(),
            });
        }

        let qpdf = open_qpdf(input_data, None)?;

        let encryption = EncryptionParams::R6(EncryptionParamsR6 {
            user_password: password.to_string(),
            owner_password: password.to_string(),
            allow_accessibility: true,
            allow_extract: true,
            allow_assemble: true,
            allow_annotate_and_form: true,
            allow_form_filling: true,
            allow_modify_other: true,
            allow_print: PrintPermission::Full,
            encrypt_metadata: true,
        });

        let mut writer = qpdf.writer();
        writer
            .preserve_encryption(false)
            .encryption_params(encryption);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Get the page count of a PDF
    ///
    /// # Arguments
    /// * `input_data` - Raw PDF bytes
    /// * `password` - Optional password for encrypted PDFs
    pub fn get_page_count(input_data: &[u8], password: Option<&str>) -> Result<u32> {
        let qpdf = open_qpdf(input_data, password)?;
        qpdf.get_num_pages().map_err(map_qpdf_error)
    }
}
