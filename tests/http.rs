//! HTTP-level tests for the conversion service.
//!
//! Each test builds the full router over fresh temporary scratch
//! directories and drives it with `axum-test`. Tests that need PDFium print
//! SKIP and return when the library cannot be bound on this host.
//!
//! Run with:
//!   cargo test --test http -- --nocapture

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use edgequake_convert::pipeline::pdfium;
use edgequake_convert::server::{self, state::AppState};
use edgequake_convert::{
    CompatibilityTable, ConvertError, Converter, PdfRasterizer, RasterizerChoice, ServerConfig,
    ServerConfigBuilder,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    server: TestServer,
    uploads: PathBuf,
    outputs: PathBuf,
    _root: TempDir,
}

async fn harness_with(customise: impl FnOnce(ServerConfigBuilder) -> ServerConfigBuilder) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let uploads = root.path().join("uploads");
    let outputs = root.path().join("outputs");
    let public = root.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), "<!doctype html><title>convert</title>").unwrap();

    let builder = ServerConfig::builder()
        .upload_dir(&uploads)
        .output_dir(&outputs)
        .static_dir(&public)
        .rasterizer(RasterizerChoice::Pdfium);
    let config = customise(builder).build().unwrap();

    let app = server::app(config).await.unwrap();
    Harness {
        server: TestServer::new(app).unwrap(),
        uploads,
        outputs,
        _root: root,
    }
}

async fn harness() -> Harness {
    harness_with(|b| b).await
}

/// Harness whose converter uses the given rasterizer and office renderer
/// instead of the ones probed on this host.
async fn harness_with_engines(rasterizer: Arc<dyn PdfRasterizer>, soffice: &Path) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let uploads = root.path().join("uploads");
    let outputs = root.path().join("outputs");
    let config = ServerConfig::builder()
        .upload_dir(&uploads)
        .output_dir(&outputs)
        .static_dir(root.path().join("public"))
        .build()
        .unwrap();
    server::prepare_scratch_dirs(&config).await.unwrap();

    let config = Arc::new(config);
    let converter = Converter::new(
        CompatibilityTable::standard(),
        rasterizer,
        soffice,
        Arc::clone(&config),
    );
    let app = server::build_router(Arc::new(AppState { config, converter }));
    Harness {
        server: TestServer::new(app).unwrap(),
        uploads,
        outputs,
        _root: root,
    }
}

/// Writes a small real JPEG as the first page, whatever the input.
struct SolidPageRasterizer;

#[async_trait]
impl PdfRasterizer for SolidPageRasterizer {
    fn name(&self) -> &'static str {
        "solid"
    }

    async fn first_page_to_jpeg(&self, _pdf: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        let page = out_dir.join("page-1.jpg");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 16, image::Rgb([200, 40, 40])))
            .save_with_format(&page, ImageFormat::Jpeg)
            .map_err(|e| ConvertError::Internal(e.to_string()))?;
        Ok(page)
    }
}

/// A stand-in `soffice` that writes `source.pdf` into its working directory.
#[cfg(unix)]
fn fake_soffice(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("soffice");
    std::fs::write(&script, "#!/bin/sh\nprintf '%%PDF-1.4\\n%%%%EOF\\n' > source.pdf\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 11) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn form(name: &str, mime: &str, bytes: Vec<u8>, target: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("targetFormat", target)
        .add_part("file", Part::bytes(bytes).file_name(name).mime_type(mime))
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Cleanup runs when the response body drops; give it a moment.
async fn assert_scratch_empty(h: &Harness) {
    for _ in 0..50 {
        if entries(&h.uploads) == 0 && entries(&h.outputs) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "scratch not empty: uploads={} outputs={}",
        entries(&h.uploads),
        entries(&h.outputs)
    );
}

fn error_text(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}

// ── Service routes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    let h = harness().await;
    let resp = h.server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn other_paths_serve_the_client() {
    let h = harness().await;
    let root = h.server.get("/").await;
    root.assert_status_ok();
    assert!(root.text().contains("<title>convert</title>"));

    let deep = h.server.get("/some/client/route").await;
    deep.assert_status_ok();
    assert!(deep.text().contains("<title>convert</title>"));
}

#[tokio::test]
async fn scratch_dirs_are_created_at_startup() {
    let h = harness().await;
    assert!(h.uploads.is_dir());
    assert!(h.outputs.is_dir());
}

// ── Validation (400) ─────────────────────────────────────────────────────────

#[tokio::test]
async fn non_multipart_body_is_a_json_no_file_error() {
    let h = harness().await;

    let text = h.server.post("/convert").text("hello").await;
    text.assert_status_bad_request();
    let body: Value = text.json();
    assert!(error_text(&body).starts_with("No file uploaded"), "got {body}");

    let empty = h.server.post("/convert").await;
    empty.assert_status_bad_request();
    let body: Value = empty.json();
    assert!(error_text(&body).starts_with("No file uploaded"), "got {body}");

    assert_scratch_empty(&h).await;
}

#[tokio::test]
async fn text_file_is_rejected_as_unsupported_type() {
    let h = harness().await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form("notes.txt", "text/plain", b"hello".to_vec(), "pdf"))
        .await;
    resp.assert_status_bad_request();
    let body: Value = resp.json();
    assert!(error_text(&body).contains("not supported"), "got {body}");
    assert_scratch_empty(&h).await;
}

#[tokio::test]
async fn oversize_file_is_rejected_with_size_message() {
    let h = harness().await;
    let big = vec![0u8; 25 * 1024 * 1024];
    let resp = h
        .server
        .post("/convert")
        .multipart(form("huge.pdf", "application/pdf", big, "jpg"))
        .await;
    resp.assert_status_bad_request();
    let body: Value = resp.json();
    assert!(error_text(&body).contains("20 MB"), "got {body}");
    assert_scratch_empty(&h).await;
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let h = harness().await;
    let resp = h
        .server
        .post("/convert")
        .multipart(MultipartForm::new().add_text("targetFormat", "pdf"))
        .await;
    resp.assert_status_bad_request();
    let body: Value = resp.json();
    assert!(error_text(&body).starts_with("No file uploaded"), "got {body}");
}

#[tokio::test]
async fn unsupported_pair_is_rejected_and_cleaned_up() {
    let h = harness().await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form("photo.png", "image/png", png_bytes(8, 8), "docx"))
        .await;
    resp.assert_status_bad_request();
    let body: Value = resp.json();
    let msg = error_text(&body);
    assert!(msg.contains("'png' to 'docx'"), "got {msg}");
    assert!(msg.contains("png → pdf"), "got {msg}");
    assert_scratch_empty(&h).await;
}

#[tokio::test]
async fn missing_target_is_rejected() {
    let h = harness().await;
    let resp = h
        .server
        .post("/convert")
        .multipart(
            MultipartForm::new()
                .add_part("file", Part::bytes(png_bytes(4, 4)).file_name("a.png").mime_type("image/png")),
        )
        .await;
    resp.assert_status_bad_request();
    assert_scratch_empty(&h).await;
}

// ── Conversion failures (500) ────────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_docx_without_renderer_is_500_and_leaves_nothing() {
    let h = harness_with(|b| b.office_binary("/nonexistent/soffice")).await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form(
            "report.pdf",
            "application/pdf",
            b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF\n".to_vec(),
            "docx",
        ))
        .await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json();
    assert!(error_text(&body).starts_with("Conversion failed"), "got {body}");
    assert_scratch_empty(&h).await;
}

// ── Successful conversions ───────────────────────────────────────────────────

#[tokio::test]
async fn png_to_pdf_returns_one_page_sized_to_the_image() {
    if !pdfium::is_available(None) {
        println!("SKIP: PDFium library not loadable on this host");
        return;
    }
    let h = harness().await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form("diagram.png", "image/png", png_bytes(40, 30), "pdf"))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.header("content-disposition"),
        "attachment; filename=\"diagram.pdf\""
    );
    assert_eq!(resp.header("content-type"), "application/pdf");

    let bytes = resp.as_bytes().to_vec();
    assert!(bytes.starts_with(b"%PDF"));

    let engine = pdfium::bind(None).unwrap();
    let doc = engine.load_pdf_from_byte_vec(bytes, None).unwrap();
    assert_eq!(doc.pages().len(), 1);
    let page = doc.pages().get(0).unwrap();
    assert!((page.width().value - 40.0).abs() < 0.5);
    assert!((page.height().value - 30.0).abs() < 0.5);

    assert_scratch_empty(&h).await;
}

#[tokio::test]
async fn pdf_to_jpg_streams_first_page_and_removes_output_directory() {
    let h = harness_with_engines(Arc::new(SolidPageRasterizer), Path::new("/nonexistent/soffice")).await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form(
            "slides.pdf",
            "application/pdf",
            b"%PDF-1.4\n%%EOF\n".to_vec(),
            "jpg",
        ))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.header("content-disposition"),
        "attachment; filename=\"slides.jpg\""
    );
    assert_eq!(resp.header("content-type"), "image/jpeg");

    let decoded = image::load_from_memory(resp.as_bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (12, 16));

    assert_scratch_empty(&h).await;
}

#[cfg(unix)]
#[tokio::test]
async fn office_document_to_pdf_returns_renderer_output() {
    let bin = tempfile::tempdir().unwrap();
    let soffice = fake_soffice(bin.path());
    let h = harness_with_engines(Arc::new(SolidPageRasterizer), &soffice).await;
    let resp = h
        .server
        .post("/convert")
        .multipart(form(
            "memo.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            b"PK\x03\x04".to_vec(),
            "pdf",
        ))
        .await;
    resp.assert_status_ok();
    assert_eq!(
        resp.header("content-disposition"),
        "attachment; filename=\"memo.pdf\""
    );
    assert_eq!(resp.header("content-type"), "application/pdf");
    assert!(resp.as_bytes().starts_with(b"%PDF-1.4"));

    assert_scratch_empty(&h).await;
}
