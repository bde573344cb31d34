//! PDFium-backed page editing, rendering and text extraction

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// PDF user-space units per inch
const POINTS_PER_INCH: f32 = 72.0;

/// Watermark appearance
const WATERMARK_FONT_SIZE: f32 = 42.0;
const WATERMARK_ANGLE_DEGREES: f32 = 30.0;
/// 50% grey at 30% opacity
const WATERMARK_COLOR: (u8, u8, u8, u8) = (128, 128, 128, 77);

/// Height of an inserted image relative to its width
pub const IMAGE_ASPECT: f32 = 0.6;

/// Get PDFium instance (creates new instance each time)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to a library next to the binary, then the conventional
    // install prefix, then whatever the system loader finds
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Whether the PDFium shared library can be bound in this process
pub fn pdfium_available() -> bool {
    create_pdfium().is_ok()
}

fn ensure_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

fn load_document<'a>(pdfium: &'a Pdfium, data: &'a [u8]) -> Result<PdfDocument<'a>> {
    ensure_pdf_header(data)?;

    pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::PasswordRequired
            }
            _ => Error::Pdfium {
                reason: format!("{}", e),
            },
        })
}

fn get_page<'a>(document: &PdfDocument<'a>, page_num: u32) -> Result<PdfPage<'a>> {
    let pages = document.pages();
    let total = pages.len() as u32;

    if page_num < 1 || page_num > total {
        return Err(Error::InvalidPage {
            page: page_num as i64,
            total,
        });
    }

    pages.get((page_num - 1) as u16).map_err(|e| Error::Pdfium {
        reason: format!("Failed to get page {}: {}", page_num, e),
    })
}

fn save(document: &PdfDocument) -> Result<Vec<u8>> {
    document.save_to_bytes().map_err(|e| Error::Pdfium {
        reason: format!("Failed to save modified PDF: {}", e),
    })
}

fn pdfium_err(context: &str) -> impl Fn(PdfiumError) -> Error + '_ {
    move |e| Error::Pdfium {
        reason: format!("{}: {}", context, e),
    }
}

// ============================================================================
// Text extraction
// ============================================================================

/// Plain text of every page, in page order
pub fn extract_page_texts(data: &[u8]) -> Result<Vec<String>> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data)?;

    document
        .pages()
        .iter()
        .enumerate()
        .map(|(index, page)| {
            page.text()
                .map(|text| text.all())
                .map_err(pdfium_err(&format!("Failed to read text of page {}", index + 1)))
        })
        .collect()
}

/// Join per-page texts into the panel's text dump: each page is introduced
/// by a `// Página <n>` marker line and followed by a blank line.
pub fn format_extracted_text(pages: &[String]) -> String {
    let mut out = String::new();
    for (index, text) in pages.iter().enumerate() {
        out.push_str(&format!("// Página {}\n", index + 1));
        out.push_str(text);
        out.push_str("\n\n");
    }
    out
}

// ============================================================================
// Rendering
// ============================================================================

/// A single page rasterized to PNG
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// PNG-encoded image bytes
    pub png: Vec<u8>,
}

/// Rasterize one page (1-indexed) at `dpi` and encode it as PNG
pub fn render_page_png(data: &[u8], page_num: u32, dpi: u16) -> Result<RenderedPage> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data)?;
    let page = get_page(&document, page_num)?;

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&config).map_err(|e| Error::Pdfium {
        reason: format!("Failed to render page {}: {}", page_num, e),
    })?;

    let dynamic_image = bitmap.as_image();
    let width = dynamic_image.width();
    let height = dynamic_image.height();

    let mut png = Vec::new();
    dynamic_image.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

    Ok(RenderedPage {
        page: page_num,
        width,
        height,
        png,
    })
}

// ============================================================================
// Watermark
// ============================================================================

/// Stamp `text` across every page as a rotated, semi-transparent overlay
/// centred on the page.
pub fn stamp_watermark(data: &[u8], text: &str) -> Result<Vec<u8>> {
    let pdfium = create_pdfium()?;
    let mut document = load_document(&pdfium, data)?;

    let font = document.fonts_mut().helvetica_bold();
    let (r, g, b, a) = WATERMARK_COLOR;
    let angle = WATERMARK_ANGLE_DEGREES.to_radians();

    for (index, mut page) in document.pages().iter().enumerate() {
        let page_num = index + 1;
        let context = format!("Failed to stamp page {}", page_num);

        let mut overlay =
            PdfPageTextObject::new(&document, text, font, PdfPoints::new(WATERMARK_FONT_SIZE))
                .map_err(pdfium_err(&context))?;

        overlay
            .set_fill_color(PdfColor::new(r, g, b, a))
            .map_err(pdfium_err(&context))?;

        let text_width = overlay.width().map_err(pdfium_err(&context))?.value;
        let text_height = WATERMARK_FONT_SIZE;

        // Rotate about the origin, then move the rotated centre of the text
        // onto the centre of the page.
        overlay
            .rotate_counter_clockwise_degrees(WATERMARK_ANGLE_DEGREES)
            .map_err(pdfium_err(&context))?;

        let (half_w, half_h) = (text_width / 2.0, text_height / 2.0);
        let rotated_cx = half_w * angle.cos() - half_h * angle.sin();
        let rotated_cy = half_w * angle.sin() + half_h * angle.cos();
        let page_cx = page.width().value / 2.0;
        let page_cy = page.height().value / 2.0;

        overlay
            .translate(
                PdfPoints::new(page_cx - rotated_cx),
                PdfPoints::new(page_cy - rotated_cy),
            )
            .map_err(pdfium_err(&context))?;

        page.objects_mut()
            .add_text_object(overlay)
            .map_err(pdfium_err(&context))?;
    }

    save(&document)
}

// ============================================================================
// Image insertion
// ============================================================================

/// Where to put an inserted image, in panel coordinates: points measured
/// from the top-left corner of the page, height derived from the width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Page number (1-indexed)
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl ImagePlacement {
    pub fn height(&self) -> f32 {
        self.width * IMAGE_ASPECT
    }

    /// Bottom-left corner in PDF user space for a page of `page_height`
    pub fn pdf_origin(&self, page_height: f32) -> (f32, f32) {
        (self.x, page_height - self.y - self.height())
    }
}

/// Decode an uploaded image of any supported format and re-encode it as PNG
pub fn normalize_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;

    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(decoded.to_rgba8())
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

    Ok(png)
}

/// Place a PNG image into the placement rectangle on its page
pub fn place_image(data: &[u8], placement: &ImagePlacement, png: &[u8]) -> Result<Vec<u8>> {
    let picture = image::load_from_memory_with_format(png, image::ImageFormat::Png)?;

    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data)?;
    let mut page = get_page(&document, placement.page)?;
    let context = format!("Failed to insert image on page {}", placement.page);

    let mut object = PdfPageImageObject::new_with_size(
        &document,
        &picture,
        PdfPoints::new(placement.width),
        PdfPoints::new(placement.height()),
    )
    .map_err(pdfium_err(&context))?;

    let (left, bottom) = placement.pdf_origin(page.height().value);
    object
        .translate(PdfPoints::new(left), PdfPoints::new(bottom))
        .map_err(pdfium_err(&context))?;

    page.objects_mut()
        .add_image_object(object)
        .map_err(pdfium_err(&context))?;

    save(&document)
}
