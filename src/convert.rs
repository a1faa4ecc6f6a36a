//! Conversion routing and dispatch.
//!
//! [`Converter::route`] is a pure mapping: it looks the (source extension,
//! target format) pair up in the [`CompatibilityTable`] and computes fresh
//! output paths inside the outputs scratch area. Nothing touches the disk
//! until [`Converter::run`] dispatches the job to its operation.
//!
//! Splitting the two lets the request handler register every path a job may
//! create with its cleanup guard *before* any tool runs.

use crate::compat::{CompatibilityTable, ConversionKind, TargetFormat};
use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::intake::UploadRecord;
use crate::pipeline::rasterize::{self, PdfRasterizer};
use crate::pipeline::{embed, office};
use crate::scratch;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A routed conversion, ready to run.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub kind: ConversionKind,
    pub target: TargetFormat,
    pub input: PathBuf,
    /// Where the produced file will be.
    pub output_file: PathBuf,
    /// Dedicated output directory, for operations that need one.
    pub output_dir: Option<PathBuf>,
    /// Filename offered to the client, e.g. `report.pdf`.
    pub download_name: String,
}

/// A produced file, verified to exist.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub dir: Option<PathBuf>,
    pub download_name: String,
}

/// Routes uploads to conversion operations and runs them.
///
/// Cheap to clone; shared by every request.
#[derive(Clone)]
pub struct Converter {
    table: Arc<CompatibilityTable>,
    rasterizer: Arc<dyn PdfRasterizer>,
    office: PathBuf,
    config: Arc<ServerConfig>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("pairs", &self.table.rules().len())
            .field("rasterizer", &self.rasterizer.name())
            .field("office", &self.office)
            .finish()
    }
}

impl Converter {
    pub fn new(
        table: CompatibilityTable,
        rasterizer: Arc<dyn PdfRasterizer>,
        office: impl Into<PathBuf>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            rasterizer,
            office: office.into(),
            config,
        }
    }

    /// Standard table, rasterizer probed for this host, renderer located.
    pub async fn from_config(config: Arc<ServerConfig>) -> Self {
        let rasterizer = rasterize::detect(&config).await;
        let office = office::locate_office(config.office_binary.as_deref());
        info!(office = %office.display(), "Office renderer resolved");
        Self::new(CompatibilityTable::standard(), rasterizer, office, config)
    }

    pub fn rasterizer_name(&self) -> &'static str {
        self.rasterizer.name()
    }

    /// Map an upload and a target string to a job. Creates nothing on disk.
    pub fn route(&self, upload: &UploadRecord, target: &str) -> Result<ConversionJob, ConvertError> {
        let source_ext = upload.extension();
        let target = target.trim().to_ascii_lowercase();

        let Some(rule) = self.table.lookup(&source_ext, &target) else {
            debug!(source_ext = %source_ext, target = %target, "No conversion for pair");
            return Err(ConvertError::UnsupportedConversion {
                source_ext: display_or_none(&source_ext),
                target: display_or_none(&target),
                supported: self.table.describe(),
            });
        };

        let stem = scratch::sanitise_stem(&upload.original_name);
        let ext = rule.target.extension();
        let output_root = &self.config.output_dir;

        let (output_file, output_dir) = if rule.kind.produces_directory() {
            let dir = scratch::unique_path(output_root, &stem, None);
            (dir.join(rasterize::FIRST_PAGE_FILE), Some(dir))
        } else {
            (scratch::unique_path(output_root, &stem, Some(ext)), None)
        };

        Ok(ConversionJob {
            kind: rule.kind,
            target: rule.target,
            input: upload.path.clone(),
            output_file,
            output_dir,
            download_name: format!("{stem}.{ext}"),
        })
    }

    /// Run a routed job and verify its output exists.
    pub async fn run(&self, job: &ConversionJob) -> Result<OutputArtifact, ConvertError> {
        let start = Instant::now();
        info!(
            kind = ?job.kind,
            input = %job.input.display(),
            "Conversion started"
        );

        let produced = match job.kind {
            ConversionKind::OfficeToPdf => {
                office::office_to_pdf(&self.office, &job.input, &job.output_file).await?;
                job.output_file.clone()
            }
            ConversionKind::PdfToImage => {
                let dir = job.output_dir.as_deref().ok_or_else(|| {
                    ConvertError::Internal("image job routed without an output directory".into())
                })?;
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| ConvertError::io(dir, e))?;
                self.rasterizer.first_page_to_jpeg(&job.input, dir).await?
            }
            ConversionKind::PdfToDocx => {
                office::pdf_to_docx(
                    &self.office,
                    &job.input,
                    &job.output_file,
                    self.config.office_timeout(),
                )
                .await?;
                job.output_file.clone()
            }
            ConversionKind::ImageToPdf => {
                embed::image_to_pdf(
                    &job.input,
                    &job.output_file,
                    self.config.pdfium_library.as_deref(),
                )
                .await?;
                job.output_file.clone()
            }
        };

        verify_output(&produced).await?;

        info!(
            kind = ?job.kind,
            output = %produced.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Conversion finished"
        );
        Ok(OutputArtifact {
            path: produced,
            dir: job.output_dir.clone(),
            download_name: job.download_name.clone(),
        })
    }
}

async fn verify_output(path: &Path) -> Result<(), ConvertError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) | Err(_) => {
            warn!(path = %path.display(), "Operation reported success without output");
            Err(ConvertError::NoOutput {
                expected: path.to_path_buf(),
            })
        }
    }
}

fn display_or_none(s: &str) -> String {
    if s.is_empty() {
        "(none)".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rasterize::PopplerRasterizer;

    fn converter(output_dir: &Path) -> Converter {
        let config = ServerConfig::builder()
            .upload_dir(output_dir.join("up"))
            .output_dir(output_dir)
            .build()
            .unwrap();
        Converter::new(
            CompatibilityTable::standard(),
            Arc::new(PopplerRasterizer::new("/nowhere/pdftoppm", 150)),
            "/nowhere/soffice",
            Arc::new(config),
        )
    }

    fn upload(dir: &Path, original: &str, stored: &str) -> UploadRecord {
        UploadRecord {
            original_name: original.to_string(),
            mime_type: "application/octet-stream".to_string(),
            path: dir.join(stored),
            size: 0,
        }
    }

    #[test]
    fn routes_every_standard_pair() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let cases = [
            ("a.docx", "pdf", ConversionKind::OfficeToPdf),
            ("a.pptx", "pdf", ConversionKind::OfficeToPdf),
            ("a.xlsx", "pdf", ConversionKind::OfficeToPdf),
            ("a.pdf", "jpg", ConversionKind::PdfToImage),
            ("a.pdf", "docx", ConversionKind::PdfToDocx),
            ("a.jpg", "pdf", ConversionKind::ImageToPdf),
            ("a.jpeg", "pdf", ConversionKind::ImageToPdf),
            ("a.PNG", "PDF", ConversionKind::ImageToPdf),
        ];
        for (name, target, kind) in cases {
            let job = c.route(&upload(dir.path(), name, name), target).unwrap();
            assert_eq!(job.kind, kind, "{name} → {target}");
            assert!(job.output_file.starts_with(dir.path()));
        }
    }

    #[test]
    fn image_jobs_get_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let job = c
            .route(&upload(dir.path(), "scan.pdf", "scan-1-0.pdf"), "jpg")
            .unwrap();
        let out_dir = job.output_dir.clone().expect("directory");
        assert_eq!(job.output_file, out_dir.join("page-1.jpg"));
        assert_eq!(job.download_name, "scan.jpg");
    }

    #[test]
    fn routing_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let job = c
            .route(&upload(dir.path(), "deck.pptx", "deck-1-0.pptx"), "pdf")
            .unwrap();
        assert!(!job.output_file.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn output_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let u = upload(dir.path(), "a.png", "a-1-0.png");
        let first = c.route(&u, "pdf").unwrap();
        let second = c.route(&u, "pdf").unwrap();
        assert_ne!(first.output_file, second.output_file);
    }

    #[test]
    fn unsupported_pair_names_pair_and_lists_supported() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let err = c
            .route(&upload(dir.path(), "a.png", "a.png"), "docx")
            .unwrap_err();
        assert!(err.is_client_error());
        let msg = err.to_string();
        assert!(msg.contains("'png' to 'docx'"), "got: {msg}");
        assert!(msg.contains("pdf → jpg"), "got: {msg}");
    }

    #[test]
    fn empty_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let err = c
            .route(&upload(dir.path(), "a.pdf", "a.pdf"), "   ")
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedConversion { ref target, .. } if target == "(none)"));
    }

    #[tokio::test]
    async fn missing_renderer_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4\n%%EOF\n").unwrap();
        let job = c
            .route(&upload(dir.path(), "in.pdf", "in.pdf"), "docx")
            .unwrap();

        let err = c.run(&job).await.unwrap_err();
        assert!(!err.is_client_error());
        assert!(err.client_message().starts_with("Conversion failed"));
        assert!(!job.output_file.exists());
    }

    #[tokio::test]
    async fn missing_rasterizer_fails_after_creating_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(dir.path());
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4\n%%EOF\n").unwrap();
        let job = c
            .route(&upload(dir.path(), "in.pdf", "in.pdf"), "jpg")
            .unwrap();

        let err = c.run(&job).await.unwrap_err();
        assert!(matches!(err, ConvertError::ToolNotFound { .. }), "got {err:?}");
        // The handler's guard owns removal of the directory.
        assert!(job.output_dir.unwrap().is_dir());
    }
}
