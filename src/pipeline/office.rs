//! Office renderer (LibreOffice `soffice`) operations.
//!
//! Both directions run the renderer headless inside a private
//! [`tempfile::TempDir`] holding a copy of the input under a fixed, plain
//! name, so spaces or unusual characters in scratch filenames never reach
//! the renderer's command line. The temporary directory is removed when it
//! drops, whichever way the conversion ends.
//!
//! Each run also gets its own user profile inside that directory. With the
//! shared default profile a second `soffice` hands its arguments to the
//! instance already running and exits 0 without converting anything.

use crate::error::ConvertError;
use crate::pipeline::command::ToolCommand;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};
use url::Url;

/// Extensions accepted by [`office_to_pdf`].
pub const OFFICE_EXTENSIONS: &[&str] = &["docx", "pptx", "xlsx"];

/// Known installation paths probed when no renderer path is configured.
#[cfg(target_os = "macos")]
const KNOWN_LOCATIONS: &[&str] = &["/Applications/LibreOffice.app/Contents/MacOS/soffice"];

#[cfg(target_os = "windows")]
const KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const KNOWN_LOCATIONS: &[&str] = &[];

/// Resolve the renderer executable.
///
/// A configured path wins. Otherwise the known installation directories for
/// this platform are probed, and the bare `soffice` command (resolved via
/// `PATH`) is the fallback.
pub fn locate_office(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    probe_locations(KNOWN_LOCATIONS).unwrap_or_else(|| PathBuf::from("soffice"))
}

fn probe_locations(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .inspect(|p| debug!("Found office renderer at {}", p.display()))
}

/// docx / pptx / xlsx → PDF.
pub async fn office_to_pdf(soffice: &Path, input: &Path, output: &Path) -> Result<(), ConvertError> {
    let ext = lower_extension(input);
    if !OFFICE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ConvertError::Internal(format!(
            "'{ext}' is not an office document extension"
        )));
    }

    let work = stage_input(input, &format!("source.{ext}")).await?;
    let staged = work.path().join(format!("source.{ext}"));

    ToolCommand::new("soffice", soffice)
        .arg(profile_arg(work.path())?)
        .args(["--headless", "--convert-to", "pdf", "--outdir"])
        .arg(work.path())
        .arg(&staged)
        .current_dir(work.path())
        .run()
        .await?;

    let produced = work.path().join("source.pdf");
    let bytes = match tokio::fs::read(&produced).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConvertError::NoOutput { expected: produced });
        }
        Err(e) => return Err(ConvertError::io(&produced, e)),
    };
    tokio::fs::write(output, &bytes)
        .await
        .map_err(|e| ConvertError::io(output, e))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = bytes.len(),
        "Office document rendered to PDF"
    );
    Ok(())
}

/// PDF → DOCX through the renderer's PDF import filter, bounded by `timeout`.
pub async fn pdf_to_docx(
    soffice: &Path,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<(), ConvertError> {
    let work = stage_input(input, "input.pdf").await?;

    ToolCommand::new("soffice", soffice)
        .arg(profile_arg(work.path())?)
        .args([
            "--headless",
            "--infilter=writer_pdf_import",
            "--convert-to",
            "docx:MS Word 2007 XML",
            "--outdir",
        ])
        .arg(work.path())
        .arg(work.path().join("input.pdf"))
        .current_dir(work.path())
        .timeout(Some(timeout))
        .run()
        .await?;

    let produced = work.path().join("input.docx");
    if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
        return Err(ConvertError::NoOutput { expected: produced });
    }
    move_file(&produced, output).await?;

    info!(
        input = %input.display(),
        output = %output.display(),
        "PDF imported and saved as DOCX"
    );
    Ok(())
}

/// Copy `input` into a fresh temporary directory as `name`.
async fn stage_input(input: &Path, name: &str) -> Result<TempDir, ConvertError> {
    let work = tempfile::Builder::new()
        .prefix("edgequake-convert-")
        .tempdir()
        .map_err(|e| ConvertError::io(std::env::temp_dir(), e))?;
    let staged = work.path().join(name);
    tokio::fs::copy(input, &staged)
        .await
        .map_err(|e| ConvertError::io(input, e))?;
    debug!("Staged {} as {}", input.display(), staged.display());
    Ok(work)
}

/// `-env:UserInstallation=file:///.../profile/` for a profile under `work`.
fn profile_arg(work: &Path) -> Result<String, ConvertError> {
    let profile = work.join("profile");
    let url = Url::from_directory_path(&profile).map_err(|()| {
        ConvertError::Internal(format!(
            "cannot express {} as a file URL",
            profile.display()
        ))
    })?;
    Ok(format!("-env:UserInstallation={url}"))
}

/// Rename, or copy when source and destination are on different filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), ConvertError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| ConvertError::io(to, e))?;
    Ok(())
}

fn lower_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
