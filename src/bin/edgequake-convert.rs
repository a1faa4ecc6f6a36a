//! Server binary for edgequake-convert.
//!
//! Maps CLI flags and environment variables onto `ServerConfig`, installs
//! logging, and serves the router until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_convert::server::{self, listen};
use edgequake_convert::{RasterizerChoice, ServerConfig};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on port 3000 (or the next free port)
  edgequake-convert

  # Custom port and scratch directories
  PORT=8080 edgequake-convert --upload-dir /var/tmp/uploads --output-dir /var/tmp/outputs

  # Force PDFium for PDF → JPG and use a specific library
  edgequake-convert --rasterizer pdfium --pdfium-lib /opt/pdfium/lib/libpdfium.so

CONVERSIONS:
  docx, pptx, xlsx   → pdf    LibreOffice (soffice)
  pdf                → jpg    pdftoppm or PDFium, first page only
  pdf                → docx   LibreOffice PDF import, 60 s deadline
  jpg, jpeg, png     → pdf    PDFium

ENVIRONMENT VARIABLES:
  PORT              First port to try (default 3000)
  HOST              Interface to bind (default 0.0.0.0)
  SOFFICE_PATH      Path to the LibreOffice executable
  PDFTOPPM_PATH     Path to pdftoppm
  PDFIUM_LIB_PATH   Path to the PDFium shared library
  RUST_LOG          Log filter, overrides --verbose
"#;

/// Upload → convert → download web service.
#[derive(Parser, Debug)]
#[command(
    name = "edgequake-convert",
    version,
    about = "Convert office documents, PDFs and images over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// First port to try; the next ports are tried while the address is in use.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// How many consecutive ports to try.
    #[arg(long, env = "CONVERT_PORT_ATTEMPTS", default_value_t = 10)]
    port_attempts: u16,

    /// Scratch directory for uploads.
    #[arg(long, env = "CONVERT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Scratch directory for converted files.
    #[arg(long, env = "CONVERT_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Directory holding the client UI.
    #[arg(long, env = "CONVERT_STATIC_DIR", default_value = "public")]
    static_dir: PathBuf,

    /// Upload size ceiling in MiB.
    #[arg(long, env = "CONVERT_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: u64,

    /// Deadline for PDF → DOCX conversions, in seconds.
    #[arg(long, env = "CONVERT_OFFICE_TIMEOUT", default_value_t = 60)]
    office_timeout: u64,

    /// LibreOffice executable. Probed from known locations if not set.
    #[arg(long, env = "SOFFICE_PATH")]
    soffice: Option<PathBuf>,

    /// pdftoppm executable. Looked up on PATH if not set.
    #[arg(long, env = "PDFTOPPM_PATH")]
    pdftoppm: Option<PathBuf>,

    /// PDFium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF → JPG engine.
    #[arg(long, env = "CONVERT_RASTERIZER", value_enum, default_value = "auto")]
    rasterizer: RasterizerArg,

    /// Rendering DPI for PDF → JPG (72–400).
    #[arg(long, env = "CONVERT_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONVERT_VERBOSE")]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CONVERT_LOG_JSON")]
    log_json: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RasterizerArg {
    Auto,
    Poppler,
    Pdfium,
}

impl From<RasterizerArg> for RasterizerChoice {
    fn from(v: RasterizerArg) -> Self {
        match v {
            RasterizerArg::Auto => RasterizerChoice::Auto,
            RasterizerArg::Poppler => RasterizerChoice::Poppler,
            RasterizerArg::Pdfium => RasterizerChoice::Pdfium,
        }
    }
}

impl Cli {
    fn to_config(&self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder()
            .host(&self.host)
            .port(self.port)
            .port_attempts(self.port_attempts)
            .upload_dir(&self.upload_dir)
            .output_dir(&self.output_dir)
            .static_dir(&self.static_dir)
            .max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024))
            .office_timeout_secs(self.office_timeout)
            .rasterizer(self.rasterizer.clone().into())
            .raster_dpi(self.dpi);
        if let Some(ref p) = self.soffice {
            builder = builder.office_binary(p);
        }
        if let Some(ref p) = self.pdftoppm {
            builder = builder.pdftoppm_binary(p);
        }
        if let Some(ref p) = self.pdfium_lib {
            builder = builder.pdfium_library(p);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else {
        "info,tower_http=info"
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "edgequake-convert starting");

    // ── Build config and router ──────────────────────────────────────────
    let config = cli.to_config()?;
    if !config.static_dir.join("index.html").is_file() {
        warn!(
            dir = %config.static_dir.display(),
            "Client UI not found; only the API routes will be useful"
        );
    }
    let (host, port, attempts) = (config.host.clone(), config.port, config.port_attempts);
    let app = server::app(config)
        .await
        .context("Failed to prepare the server")?;

    // ── Bind with port fallback ──────────────────────────────────────────
    let listener = listen::bind_with_retry(&host, port, attempts)
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("edgequake-convert stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        park_on_failure(tokio::signal::ctrl_c().await, "Ctrl-C").await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => park_on_failure(Err(e), "SIGTERM").await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}

/// A handler that could not be installed never fires, so it must not end
/// the `select!` and stop the server.
async fn park_on_failure(result: io::Result<()>, handler: &str) {
    if let Err(e) = result {
        warn!(error = %e, handler, "Failed to install signal handler");
        std::future::pending::<()>().await;
    }
}
