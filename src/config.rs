//! Configuration for the conversion server.
//!
//! All behaviour is controlled through [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests construct configs directly with
//! temporary scratch directories.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default upload ceiling: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for the conversion server.
///
/// # Example
/// ```rust
/// use edgequake_convert::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .upload_dir("/tmp/convert/uploads")
///     .output_dir("/tmp/convert/outputs")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// First port to try. Default: 3000.
    pub port: u16,

    /// How many successive ports to try when the address is in use. Default: 10.
    pub port_attempts: u16,

    /// Scratch area for incoming uploads. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Scratch area for produced files. Default: `outputs`.
    pub output_dir: PathBuf,

    /// Directory holding the client UI bundle. Default: `public`.
    pub static_dir: PathBuf,

    /// Upload size ceiling in bytes. Default: 20 MiB.
    pub max_upload_bytes: u64,

    /// Deadline for the PDF → DOCX renderer run, in seconds. Default: 60.
    pub office_timeout_secs: u64,

    /// Explicit path to the office renderer (`soffice`). If None, probed.
    pub office_binary: Option<PathBuf>,

    /// Explicit path to `pdftoppm`. If None, looked up on `PATH`.
    pub pdftoppm_binary: Option<PathBuf>,

    /// Explicit path to the PDFium shared library. If None, the working
    /// directory and then the system library search path are tried.
    pub pdfium_library: Option<PathBuf>,

    /// Which PDF rasterizer to use for PDF → JPEG. Default: [`RasterizerChoice::Auto`].
    pub rasterizer: RasterizerChoice,

    /// Rendering DPI for PDF → JPEG. Range: 72–400. Default: 150.
    pub raster_dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 4000.
    ///
    /// Only honoured by the PDFium rasterizer; `pdftoppm` renders at
    /// `raster_dpi` without a cap.
    pub max_rendered_pixels: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            port_attempts: 10,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            static_dir: PathBuf::from("public"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            office_timeout_secs: 60,
            office_binary: None,
            pdftoppm_binary: None,
            pdfium_library: None,
            rasterizer: RasterizerChoice::default(),
            raster_dpi: 150,
            max_rendered_pixels: 4000,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Deadline applied to the PDF → DOCX renderer run.
    pub fn office_timeout(&self) -> Duration {
        Duration::from_secs(self.office_timeout_secs)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn port_attempts(mut self, n: u16) -> Self {
        self.config.port_attempts = n.max(1);
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs;
        self
    }

    pub fn office_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.office_binary = Some(path.into());
        self
    }

    pub fn pdftoppm_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_binary = Some(path.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn rasterizer(mut self, choice: RasterizerChoice) -> Self {
        self.config.rasterizer = choice;
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.config.raster_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Upload limit must be greater than zero".into(),
            ));
        }
        if c.office_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Office renderer timeout must be at least 1 second".into(),
            ));
        }
        if c.upload_dir == c.output_dir {
            return Err(ConvertError::InvalidConfig(format!(
                "Upload and output directories must differ (both are '{}')",
                c.upload_dir.display()
            )));
        }
        Ok(self.config)
    }
}

/// Which PDF rasterizer backs the PDF → JPEG conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerChoice {
    /// Probe the host at startup: `pdftoppm` on Linux when present, PDFium otherwise. (default)
    #[default]
    Auto,
    /// Always shell out to Poppler's `pdftoppm`.
    Poppler,
    /// Always render in-process with PDFium.
    Pdfium,
}
