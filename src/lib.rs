//! # edgequake-convert
//!
//! Upload → convert → download. An HTTP service that takes an office
//! document, PDF or image, converts it with an external engine and streams
//! the result back as a download.
//!
//! ## Conversions
//!
//! | Source | Target | Engine |
//! |--------|--------|--------|
//! | docx, pptx, xlsx | pdf | LibreOffice (`soffice --headless`) |
//! | pdf | jpg | `pdftoppm` or PDFium, first page only |
//! | pdf | docx | LibreOffice PDF import, 60 s deadline |
//! | jpg, jpeg, png | pdf | PDFium, one page sized to the image |
//!
//! ## Request Lifecycle
//!
//! ```text
//! POST /convert (multipart: file, targetFormat)
//!  │
//!  ├─ 1. Intake   MIME allow-list + 20 MiB ceiling, checked while streaming
//!  ├─ 2. Persist  uploads/<name>-<suffix>.<ext>
//!  ├─ 3. Route    (extension, target) → operation via the CompatibilityTable
//!  ├─ 4. Convert  soffice / pdftoppm / PDFium, verify the output exists
//!  └─ 5. Deliver  stream with Content-Disposition, then delete scratch files
//! ```
//!
//! Client mistakes are answered with 400 before any engine runs; engine
//! failures with 500. Both carry `{ "error": "..." }`, and every path
//! removes whatever the request wrote to disk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(3000).build()?;
//!     let (host, port, attempts) = (config.host.clone(), config.port, config.port_attempts);
//!     let app = server::app(config).await?;
//!     let listener = server::listen::bind_with_retry(&host, port, attempts).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edgequake-convert` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compat;
pub mod config;
pub mod convert;
pub mod error;
pub mod intake;
pub mod pipeline;
pub mod scratch;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compat::{CompatibilityRule, CompatibilityTable, ConversionKind, TargetFormat};
pub use config::{RasterizerChoice, ServerConfig, ServerConfigBuilder};
pub use convert::{ConversionJob, Converter, OutputArtifact};
pub use error::ConvertError;
pub use intake::UploadRecord;
pub use pipeline::rasterize::PdfRasterizer;
pub use scratch::ScratchGuard;
