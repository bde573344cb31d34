//! Shared validation of panel form inputs
//!
//! Everything here runs before a document is opened, so a rejected request
//! never reaches the PDF engines.

use crate::error::{Error, Result};

pub const DEFAULT_DEGREES: i32 = 90;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_WATERMARK_TEXT: &str = "PDF Wizard";
pub const DEFAULT_IMAGE_X: f32 = 50.0;
pub const DEFAULT_IMAGE_Y: f32 = 50.0;
pub const DEFAULT_IMAGE_WIDTH: f32 = 200.0;

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Rotation in degrees; any integer that is a multiple of 90, sign allowed.
pub fn parse_degrees(raw: Option<&str>) -> Result<i32> {
    let Some(raw) = present(raw) else {
        return Ok(DEFAULT_DEGREES);
    };

    let degrees: i32 = raw.parse().map_err(|_| Error::InvalidArgument {
        reason: format!("degrees must be an integer, got {:?}", raw),
    })?;

    if degrees % 90 != 0 {
        return Err(Error::InvalidArgument {
            reason: format!("degrees must be a multiple of 90, got {}", degrees),
        });
    }

    Ok(degrees)
}

/// A 1-based page number as typed by the user. Bounds are checked later
/// against the real page count with [`check_page`].
pub fn parse_page(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = present(raw) else {
        return Ok(DEFAULT_PAGE);
    };

    raw.parse().map_err(|_| Error::InvalidArgument {
        reason: format!("page must be an integer, got {:?}", raw),
    })
}

/// Ensure `page` lies in `1..=total`. Never clamps.
pub fn check_page(page: i64, total: u32) -> Result<u32> {
    if page < 1 || page > total as i64 {
        return Err(Error::InvalidPage { page, total });
    }
    Ok(page as u32)
}

/// A finite coordinate in points
pub fn parse_coordinate(name: &str, raw: Option<&str>, default: f32) -> Result<f32> {
    let Some(raw) = present(raw) else {
        return Ok(default);
    };

    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::InvalidArgument {
            reason: format!("{} must be a number, got {:?}", name, raw),
        }),
    }
}

/// A strictly positive, finite width in points
pub fn parse_width(raw: Option<&str>) -> Result<f32> {
    let width = parse_coordinate("w", raw, DEFAULT_IMAGE_WIDTH)?;
    if width <= 0.0 {
        return Err(Error::InvalidArgument {
            reason: format!("w must be positive, got {}", width),
        });
    }
    Ok(width)
}

/// Watermark text, falling back to the default when left blank
pub fn watermark_text(raw: Option<&str>) -> String {
    present(raw).unwrap_or(DEFAULT_WATERMARK_TEXT).to_string()
}

/// Whether a client filename carries a `.pdf` extension (any case)
pub fn is_pdf_filename(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case("pdf"),
        None => false,
    }
}

/// The `filename` field every panel call carries
pub fn require_filename(raw: Option<&str>) -> Result<&str> {
    present(raw).ok_or_else(|| Error::InvalidArgument {
        reason: "filename is required".to_string(),
    })
}
