//! Scratch-area helpers: collision-resistant names and request-scoped cleanup.
//!
//! Every request owns the files it creates under `uploads/` and `outputs/`.
//! Names carry a millisecond timestamp plus a process-wide sequence number,
//! so two requests never share a path and no locking is needed.
//!
//! [`ScratchGuard`] records each path as it is created and deletes all of
//! them exactly once, when the guard is dropped. On success the guard is
//! moved into the response body, so deletion happens after the download
//! finishes (or the client goes away); on failure it drops with the handler.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time-based uniqueness suffix: `<unix millis>-<sequence>`.
pub fn unique_suffix() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq}")
}

/// Reduce a client-supplied filename to a safe base name (no extension).
///
/// Directory components are dropped and anything outside
/// `[A-Za-z0-9._-]` becomes `_`. An empty result becomes `"file"`.
pub fn sanitise_stem(original_name: &str) -> String {
    // Clients on Windows send backslash-separated paths.
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Lower-cased extension of a client-supplied filename, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Build `<dir>/<stem>-<suffix>[.<ext>]`.
pub fn unique_path(dir: &Path, stem: &str, ext: Option<&str>) -> PathBuf {
    let name = match ext {
        Some(ext) => format!("{}-{}.{}", stem, unique_suffix(), ext),
        None => format!("{}-{}", stem, unique_suffix()),
    };
    dir.join(name)
}

/// Request-scoped cleanup of scratch files and directories.
#[derive(Debug, Default)]
pub struct ScratchGuard {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl ScratchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete `path` when the guard drops.
    pub fn track_file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }

    /// Recursively delete `path` when the guard drops.
    pub fn track_dir(&mut self, path: impl Into<PathBuf>) {
        self.dirs.push(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for file in self.files.drain(..) {
            match std::fs::remove_file(&file) {
                Ok(()) => debug!("Removed scratch file {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), error = %e, "Failed to remove scratch file"),
            }
        }
        for dir in self.dirs.drain(..) {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => debug!("Removed scratch directory {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to remove scratch directory")
                }
            }
        }
    }
}
