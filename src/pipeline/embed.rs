//! Image → PDF: embed a JPEG or PNG as the only page of a new document.
//!
//! The page is sized to the image's pixel dimensions, one pixel per PDF
//! point, and the image is placed at (0, 0) covering the whole page. The
//! codec is picked from the file extension rather than sniffed.

use crate::error::ConvertError;
use crate::pipeline::pdfium::{self, pdf_error};
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Codec for an image extension, or `None` when the extension is not embeddable.
pub fn codec_for(ext: &str) -> Option<ImageFormat> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

/// Convert the image at `input` to a one-page PDF at `output`.
///
/// Runs inside `spawn_blocking`; PDFium and image decoding are CPU-bound.
pub async fn image_to_pdf(
    input: &Path,
    output: &Path,
    pdfium_library: Option<&Path>,
) -> Result<(), ConvertError> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let format = codec_for(ext).ok_or_else(|| {
        ConvertError::Internal(format!("'{ext}' is not an embeddable image extension"))
    })?;

    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| ConvertError::io(input, e))?;
    let library = pdfium_library.map(Path::to_path_buf);

    let pdf = tokio::task::spawn_blocking(move || embed_blocking(&bytes, format, library))
        .await
        .map_err(|e| ConvertError::Internal(format!("Embed task panicked: {}", e)))??;

    tokio::fs::write(output, &pdf)
        .await
        .map_err(|e| ConvertError::io(output, e))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = pdf.len(),
        "Image embedded into PDF"
    );
    Ok(())
}

fn embed_blocking(
    bytes: &[u8],
    format: ImageFormat,
    library: Option<PathBuf>,
) -> Result<Vec<u8>, ConvertError> {
    let image: DynamicImage = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = (image.width() as f32, image.height() as f32);
    debug!("Decoded {:?} image {}x{} px", format, width, height);

    let pdfium = pdfium::bind(library.as_deref())?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| pdf_error("create document", e))?;

    let size = PdfPagePaperSize::Custom(PdfPoints::new(width), PdfPoints::new(height));
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(size)
            .map_err(|e| pdf_error("create page", e))?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::ZERO,
                PdfPoints::ZERO,
                &image,
                Some(PdfPoints::new(width)),
                Some(PdfPoints::new(height)),
            )
            .map_err(|e| pdf_error("embed image", e))?;
    }

    document
        .save_to_bytes()
        .map_err(|e| pdf_error("serialise document", e))
}
