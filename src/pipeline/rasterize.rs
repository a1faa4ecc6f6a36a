//! PDF → JPEG: render the first page of a PDF into an output directory.
//!
//! Two providers implement [`PdfRasterizer`]:
//!
//! | Provider | Engine | Where |
//! |----------|--------|-------|
//! | [`PopplerRasterizer`] | `pdftoppm` subprocess | Linux hosts with poppler-utils |
//! | [`PdfiumRasterizer`]  | PDFium via `pdfium-render`, in `spawn_blocking` | everywhere else |
//!
//! [`detect`] picks one at startup and the server holds it as an
//! `Arc<dyn PdfRasterizer>`. Both write `<dir>/page-1.jpg`
//! ([`FIRST_PAGE_FILE`]) and fail with [`ConvertError::NoOutput`] if that
//! file is missing afterwards.

use crate::config::{RasterizerChoice, ServerConfig};
use crate::error::ConvertError;
use crate::pipeline::command::{self, ToolCommand};
use crate::pipeline::pdfium::{self, pdf_error};
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Filename prefix for rendered pages.
pub const PAGE_PREFIX: &str = "page";

/// Name of the first rendered page inside the output directory.
pub const FIRST_PAGE_FILE: &str = "page-1.jpg";

/// Renders the first page of a PDF to `<out_dir>/page-1.jpg`.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Render page 1 of `pdf` into `out_dir` (which already exists) and
    /// return the path of the JPEG.
    async fn first_page_to_jpeg(&self, pdf: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError>;
}

// ── Poppler ─────────────────────────────────────────────────────────────────

/// Shells out to Poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    program: PathBuf,
    dpi: u32,
}

impl PopplerRasterizer {
    pub fn new(program: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            program: program.into(),
            dpi,
        }
    }
}

#[async_trait]
impl PdfRasterizer for PopplerRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    async fn first_page_to_jpeg(&self, pdf: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        ToolCommand::new("pdftoppm", &self.program)
            .args(["-jpeg", "-f", "1", "-l", "1", "-r"])
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .run()
            .await?;

        normalise_first_page(out_dir).await
    }
}

/// `pdftoppm` zero-pads page numbers to the width of the page count
/// (`page-01.jpg` for a 10-page document). Rename whatever it wrote for
/// page 1 to [`FIRST_PAGE_FILE`].
async fn normalise_first_page(out_dir: &Path) -> Result<PathBuf, ConvertError> {
    let expected = out_dir.join(FIRST_PAGE_FILE);
    if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
        return Ok(expected);
    }

    let mut entries = tokio::fs::read_dir(out_dir)
        .await
        .map_err(|e| ConvertError::io(out_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(out_dir, e))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if is_first_page_name(name) {
            debug!("Renaming {} to {}", name, FIRST_PAGE_FILE);
            tokio::fs::rename(entry.path(), &expected)
                .await
                .map_err(|e| ConvertError::io(&expected, e))?;
            return Ok(expected);
        }
    }

    Err(ConvertError::NoOutput { expected })
}

fn is_first_page_name(name: &str) -> bool {
    name.strip_prefix(PAGE_PREFIX)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .and_then(|digits| digits.parse::<u32>().ok())
        == Some(1)
}

// ── PDFium ──────────────────────────────────────────────────────────────────

/// Renders in-process with PDFium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library: Option<PathBuf>, dpi: u32, max_pixels: u32) -> Self {
        Self {
            library,
            dpi,
            max_pixels,
        }
    }
}

#[async_trait]
impl PdfRasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    async fn first_page_to_jpeg(&self, pdf: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        let pdf = pdf.to_path_buf();
        let target = out_dir.join(FIRST_PAGE_FILE);
        let library = self.library.clone();
        let (dpi, max_pixels) = (self.dpi, self.max_pixels);

        let written = target.clone();
        tokio::task::spawn_blocking(move || {
            render_first_page_blocking(&pdf, &written, library.as_deref(), dpi, max_pixels)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))??;

        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ConvertError::NoOutput { expected: target });
        }
        Ok(target)
    }
}

fn render_first_page_blocking(
    pdf_path: &Path,
    target: &Path,
    library: Option<&Path>,
    dpi: u32,
    max_pixels: u32,
) -> Result<(), ConvertError> {
    let pdfium = pdfium::bind(library)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| pdf_error(&format!("open '{}'", pdf_path.display()), e))?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(ConvertError::Pdf(format!(
            "'{}' has no pages",
            pdf_path.display()
        )));
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages.get(0).map_err(|e| pdf_error("load page 1", e))?;
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| pdf_error("render page 1", e))?;

    // JPEG has no alpha channel.
    let image = bitmap.as_image().to_rgb8();
    debug!("Rendered page 1 → {}x{} px", image.width(), image.height());

    image.save_with_format(target, ImageFormat::Jpeg)?;
    Ok(())
}

// ── Provider selection ──────────────────────────────────────────────────────

/// Pick the rasterizer for this host.
///
/// `Auto` prefers `pdftoppm` on Linux when it answers a version probe and
/// falls back to PDFium otherwise. Explicit choices are honoured without
/// probing.
pub async fn detect(config: &ServerConfig) -> Arc<dyn PdfRasterizer> {
    let pdftoppm = config
        .pdftoppm_binary
        .clone()
        .unwrap_or_else(|| PathBuf::from("pdftoppm"));
    let poppler = || -> Arc<dyn PdfRasterizer> {
        Arc::new(PopplerRasterizer::new(pdftoppm.clone(), config.raster_dpi))
    };
    let pdfium = || -> Arc<dyn PdfRasterizer> {
        Arc::new(PdfiumRasterizer::new(
            config.pdfium_library.clone(),
            config.raster_dpi,
            config.max_rendered_pixels,
        ))
    };

    let chosen = match config.rasterizer {
        RasterizerChoice::Poppler => poppler(),
        RasterizerChoice::Pdfium => pdfium(),
        RasterizerChoice::Auto => {
            if cfg!(target_os = "linux") && command::is_available(&pdftoppm, "-v").await {
                poppler()
            } else {
                if cfg!(target_os = "linux") {
                    warn!("pdftoppm not found; PDF → JPEG will use PDFium");
                }
                pdfium()
            }
        }
    };

    info!(rasterizer = chosen.name(), "PDF rasterizer selected");
    chosen
}
