//! Conversion operations and the engines behind them.
//!
//! Each operation takes an input path and an output path (or directory) and
//! either leaves a complete output file behind or returns an error.
//!
//! ```text
//! docx/pptx/xlsx ──▶ office::office_to_pdf     (soffice --convert-to pdf)
//! pdf            ──▶ rasterize::PdfRasterizer  (pdftoppm | PDFium, page 1 → JPEG)
//! pdf            ──▶ office::pdf_to_docx       (soffice PDF import, 60 s deadline)
//! jpg/jpeg/png   ──▶ embed::image_to_pdf       (PDFium, page sized to the image)
//! ```
//!
//! Supporting modules:
//!
//! - [`command`]: spawn an external tool with an optional deadline
//! - [`pdfium`]: bind the PDFium shared library

pub mod command;
pub mod embed;
pub mod office;
pub mod pdfium;
pub mod rasterize;
