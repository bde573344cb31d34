//! PDF processing layer
//!
//! This module provides PDF processing functionality using PDFium and qpdf.

mod editor;
mod qpdf;

pub use editor::{
    extract_page_texts, format_extracted_text, normalize_image, pdfium_available, place_image,
    render_page_png, stamp_watermark, ImagePlacement, RenderedPage, IMAGE_ASPECT,
};
pub use qpdf::{parse_split_ranges, QpdfWrapper};
