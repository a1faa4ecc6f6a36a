//! Upload intake: read a multipart conversion request, validate it, and
//! persist the file to the uploads scratch area.
//!
//! Validation happens while the body streams in. The MIME type is checked
//! against the allow-list from the part headers before a single byte of
//! content is read, and the size ceiling is checked after every chunk. The
//! accepted bytes are held in memory until the whole form has been read, so
//! a rejected upload never reaches the disk.

use crate::error::ConvertError;
use crate::scratch::{self, ScratchGuard};
use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// MIME types accepted by the server (and mirrored by the client UI).
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/pdf",
    "image/jpeg",
    "image/png",
];

/// Short names used in the "not supported" message.
const ALLOWED_SHORT_NAMES: &str = "DOCX, PPTX, XLSX, PDF, JPG, PNG";

/// Longest `targetFormat` value read from the form.
const MAX_TARGET_FORMAT_LEN: usize = 64;

/// A validated file held in memory, not yet written to disk.
#[derive(Debug)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// The parsed conversion form.
#[derive(Debug)]
pub struct ConvertForm {
    pub file: IncomingFile,
    /// Raw `targetFormat` value; empty when the field was absent.
    pub target_format: String,
}

/// An upload persisted to the scratch area.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub original_name: String,
    pub mime_type: String,
    pub path: PathBuf,
    pub size: u64,
}

impl UploadRecord {
    /// Lower-cased extension of the stored file, or `""` when it has none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Reject MIME types outside [`ALLOWED_MIME_TYPES`].
///
/// Parameters such as `; charset=binary` are ignored.
pub fn check_mime(mime: &str) -> Result<(), ConvertError> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ConvertError::UnsupportedFileType {
            mime: if essence.is_empty() {
                "unknown".to_string()
            } else {
                essence
            },
            allowed: ALLOWED_SHORT_NAMES.to_string(),
        })
    }
}

/// Reject uploads whose running size exceeds `limit` bytes.
pub fn check_size(received: u64, limit: u64) -> Result<(), ConvertError> {
    if received > limit {
        Err(ConvertError::FileTooLarge {
            limit_mb: limit_mb(limit),
        })
    } else {
        Ok(())
    }
}

/// Read the `file` and `targetFormat` fields of a conversion request.
///
/// Unknown fields are skipped. Nothing is written to disk.
pub async fn read_form(
    mut multipart: Multipart,
    max_upload_bytes: u64,
) -> Result<ConvertForm, ConvertError> {
    let mut file: Option<IncomingFile> = None;
    let mut target_format = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(ConvertError::InvalidUpload(
                        "only one file may be uploaded per request".into(),
                    ));
                }
                file = Some(read_file_field(field, max_upload_bytes).await?);
            }
            "targetFormat" => {
                target_format = read_text_bounded(field, MAX_TARGET_FORMAT_LEN).await?;
            }
            other => {
                debug!("Ignoring unexpected form field '{}'", other);
            }
        }
    }

    let file = file.ok_or(ConvertError::NoFile)?;
    Ok(ConvertForm {
        file,
        target_format: target_format.trim().to_ascii_lowercase(),
    })
}

async fn read_file_field(
    mut field: Field<'_>,
    max_upload_bytes: u64,
) -> Result<IncomingFile, ConvertError> {
    let original_name = field.file_name().unwrap_or("").to_string();
    if original_name.is_empty() {
        return Err(ConvertError::NoFile);
    }
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    check_mime(&mime_type)?;

    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        let received = (bytes.len() + chunk.len()) as u64;
        if let Err(e) = check_size(received, max_upload_bytes) {
            warn!(
                file = %original_name,
                received,
                limit = max_upload_bytes,
                "Upload exceeds size limit, aborting"
            );
            return Err(e);
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Err(ConvertError::NoFile);
    }

    Ok(IncomingFile {
        original_name,
        mime_type,
        bytes,
    })
}

/// Write a validated upload to `upload_dir` under a collision-resistant name.
///
/// The path is handed to `guard` before the write starts, so a partial file
/// left by a failed write is still removed.
pub async fn persist(
    file: IncomingFile,
    upload_dir: &Path,
    guard: &mut ScratchGuard,
) -> Result<UploadRecord, ConvertError> {
    let stem = scratch::sanitise_stem(&file.original_name);
    let ext = scratch::extension_of(&file.original_name);
    let path = scratch::unique_path(upload_dir, &stem, ext.as_deref());
    guard.track_file(&path);

    tokio::fs::write(&path, &file.bytes)
        .await
        .map_err(|e| ConvertError::io(&path, e))?;

    let size = file.bytes.len() as u64;
    info!(
        file = %file.original_name,
        mime = %file.mime_type,
        size,
        path = %path.display(),
        "Upload stored"
    );

    Ok(UploadRecord {
        original_name: file.original_name,
        mime_type: file.mime_type,
        path,
        size,
    })
}

/// Upload ceiling in whole MiB, for user-facing messages.
pub fn limit_mb(max_upload_bytes: u64) -> u64 {
    max_upload_bytes / (1024 * 1024)
}

/// A body that hit the request size limit is reported like an oversize file.
fn multipart_error(e: MultipartError, max_upload_bytes: u64) -> ConvertError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::FileTooLarge {
            limit_mb: limit_mb(max_upload_bytes),
        }
    } else {
        ConvertError::InvalidUpload(e.body_text())
    }
}

/// Read a text field, refusing values longer than `max` bytes.
async fn read_text_bounded(mut field: Field<'_>, max: usize) -> Result<String, ConvertError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ConvertError::InvalidUpload(e.body_text()))?
    {
        if buf.len() + chunk.len() > max {
            return Err(ConvertError::InvalidUpload(format!(
                "targetFormat must be at most {max} bytes"
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf)
        .map_err(|_| ConvertError::InvalidUpload("targetFormat must be UTF-8 text".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_office_pdf_and_images() {
        for mime in ALLOWED_MIME_TYPES {
            assert!(check_mime(mime).is_ok(), "{mime} should be accepted");
        }
        assert!(check_mime("image/PNG").is_ok());
        assert!(check_mime("application/pdf; charset=binary").is_ok());
    }

    #[test]
    fn allow_list_rejects_everything_else() {
        for mime in ["text/plain", "image/gif", "application/msword", "", "application/zip"] {
            let err = check_mime(mime).unwrap_err();
            assert!(
                matches!(err, ConvertError::UnsupportedFileType { .. }),
                "{mime} should be rejected"
            );
            assert!(err.to_string().contains("DOCX, PPTX, XLSX, PDF, JPG, PNG"));
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let limit = 20 * 1024 * 1024;
        assert!(check_size(limit, limit).is_ok());
        let err = check_size(limit + 1, limit).unwrap_err();
        assert!(err.to_string().contains("20 MB"), "got: {err}");
    }

    #[tokio::test]
    async fn persist_writes_under_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = IncomingFile {
            original_name: "My Slides.PPTX".into(),
            mime_type: ALLOWED_MIME_TYPES[1].into(),
            bytes: b"PK\x03\x04".to_vec(),
        };
        let mut guard = ScratchGuard::new();
        let record = persist(file, dir.path(), &mut guard).await.unwrap();

        assert!(record.path.starts_with(dir.path()));
        assert_eq!(record.extension(), "pptx");
        assert_eq!(record.size, 4);
        let name = record.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("My_Slides-"), "got: {name}");
        assert_eq!(std::fs::read(&record.path).unwrap(), b"PK\x03\x04");

        drop(guard);
        assert!(!record.path.exists());
    }

    #[tokio::test]
    async fn failed_write_is_still_tracked_for_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let file = IncomingFile {
            original_name: "scan.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF".to_vec(),
        };
        let mut guard = ScratchGuard::new();
        let err = persist(file, &dir.path().join("missing"), &mut guard)
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Io { .. }), "got {err:?}");
        assert!(!guard.is_empty());
    }

    #[test]
    fn limit_is_reported_in_whole_mebibytes() {
        assert_eq!(limit_mb(20 * 1024 * 1024), 20);
        assert_eq!(limit_mb(20 * 1024 * 1024 + 1), 20);
    }
}
