//! Streaming a produced file back as a download.
//!
//! The request's [`ScratchGuard`] is moved into the response body stream, so
//! the upload, the output file and any output directory are removed once
//! the body has been sent, or dropped because the client went away.

use crate::convert::OutputArtifact;
use crate::error::ConvertError;
use crate::scratch::ScratchGuard;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::info;

/// Build a `200 OK` attachment response for `artifact`.
pub async fn attachment(artifact: OutputArtifact, guard: ScratchGuard) -> Result<Response, ConvertError> {
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| ConvertError::io(&artifact.path, e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ConvertError::io(&artifact.path, e))?
        .len();

    let mime = mime_guess::from_path(&artifact.download_name).first_or_octet_stream();
    let disposition = content_disposition(&artifact.download_name);

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _cleanup = &guard;
        chunk
    });

    info!(
        file = %artifact.download_name,
        bytes = length,
        content_type = %mime,
        "Streaming converted file"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| ConvertError::Internal(format!("building download response: {e}")))
}

/// `attachment; filename="<name>"`, with anything that cannot sit inside a
/// quoted header value replaced by `_`.
pub fn content_disposition(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
