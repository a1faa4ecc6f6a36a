//! Error types for the edgequake-convert library.
//!
//! A single enum, [`ConvertError`], covers the whole request lifecycle. Its
//! variants fall into three groups that decide how a failure is reported:
//!
//! * **Client input**: oversize upload, disallowed MIME type, missing file,
//!   unsupported source/target pair. Detected before any external tool runs
//!   and reported as HTTP 400 with the message verbatim.
//!
//! * **Tool invocation**: converter binary missing, non-zero exit, deadline
//!   exceeded, PDFium unavailable or failing.
//!
//! * **Output verification**: a tool claimed success but the expected file
//!   is absent.
//!
//! The last two groups are reported as HTTP 500 with a "Conversion failed"
//! prefix (see [`ConvertError::client_message`]).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-convert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Client input errors ───────────────────────────────────────────────
    /// The multipart request carried no `file` field.
    #[error("No file uploaded. Attach a file in the 'file' field.")]
    NoFile,

    /// The upload exceeded the configured size ceiling.
    #[error("File too large. Maximum allowed size is {limit_mb} MB.")]
    FileTooLarge { limit_mb: u64 },

    /// The declared MIME type is not on the allow-list.
    #[error("File type '{mime}' is not supported. Allowed types: {allowed}.")]
    UnsupportedFileType { mime: String, allowed: String },

    /// The (source extension, target format) pair is not in the compatibility table.
    #[error("Cannot convert '{source_ext}' to '{target}'. Supported conversions: {supported}.")]
    UnsupportedConversion {
        source_ext: String,
        target: String,
        supported: String,
    },

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {0}")]
    InvalidUpload(String),

    // ── Tool invocation errors ────────────────────────────────────────────
    /// The external executable could not be found on this host.
    #[error("'{tool}' was not found. Install it or point the server at its location.")]
    ToolNotFound { tool: String },

    /// The external executable ran but exited unsuccessfully.
    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The external executable did not finish before its deadline and was killed.
    #[error("'{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    /// The PDFium shared library could not be bound.
    #[error("PDFium library unavailable: {0}")]
    PdfiumUnavailable(String),

    /// PDFium returned an error while loading, rendering or writing a document.
    #[error("PDF processing failed: {0}")]
    Pdf(String),

    /// The source image could not be decoded or the raster could not be encoded.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    // ── Output verification errors ────────────────────────────────────────
    /// A tool reported success but the expected output file is missing.
    #[error("No output produced (expected '{expected}')")]
    NoOutput { expected: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a scratch file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Wrap an [`std::io::Error`] together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors caused by the request itself (HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::NoFile
                | ConvertError::FileTooLarge { .. }
                | ConvertError::UnsupportedFileType { .. }
                | ConvertError::UnsupportedConversion { .. }
                | ConvertError::InvalidUpload(_)
        )
    }

    /// The message shown to the client.
    ///
    /// Client errors are returned as-is; everything else is folded into a
    /// single "Conversion failed" error. Tool errors carry their detail;
    /// errors that would reveal server paths do not.
    pub fn client_message(&self) -> String {
        match self {
            e if e.is_client_error() => e.to_string(),
            ConvertError::NoOutput { .. } => "Conversion failed: no output produced".to_string(),
            ConvertError::Io { .. } | ConvertError::Internal(_) => {
                "Conversion failed: internal error".to_string()
            }
            e => format!("Conversion failed: {e}"),
        }
    }
}
