//! PDFium binding.
//!
//! Resolution order, first match wins:
//!
//! 1. An explicit library path from the configuration (`--pdfium-lib` /
//!    `PDFIUM_LIB_PATH`).
//! 2. The platform library name in the working directory
//!    (`libpdfium.so`, `libpdfium.dylib`, `pdfium.dll`).
//! 3. The system library search path.
//!
//! Binding is cheap after the first load, so every blocking task binds its
//! own [`Pdfium`] handle instead of sharing one across threads.

use crate::error::ConvertError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Bind to a PDFium library, or fail with [`ConvertError::PdfiumUnavailable`].
pub fn bind(library: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match library {
        Some(path) => {
            debug!("Binding PDFium from {}", path.display());
            Pdfium::bind_to_library(path).map_err(|e| {
                ConvertError::PdfiumUnavailable(format!("{}: {:?}", path.display(), e))
            })?
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ConvertError::PdfiumUnavailable(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// `true` when [`bind`] would succeed.
pub fn is_available(library: Option<&Path>) -> bool {
    bind(library).is_ok()
}

/// Map a PDFium error into the library error type.
pub(crate) fn pdf_error(context: &str, e: PdfiumError) -> ConvertError {
    ConvertError::Pdf(format!("{context}: {e:?}"))
}
