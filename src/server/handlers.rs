//! Request handlers.

use crate::error::ConvertError;
use crate::intake;
use crate::scratch::ScratchGuard;
use crate::server::delivery;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// `POST /convert`: multipart `file` + `targetFormat` in, converted file out.
///
/// Every scratch path is registered with the request's [`ScratchGuard`]
/// before the step that may create it. On error the guard drops here; on
/// success it travels with the response body.
///
/// A body that is not `multipart/form-data` at all carries no file, and is
/// answered like a form without one.
pub async fn convert_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Request body is not a multipart form");
        ConvertError::NoFile
    })?;
    let mut guard = ScratchGuard::new();

    // ── 1. Intake ─────────────────────────────────────────────────────────
    let form = intake::read_form(multipart, state.config.max_upload_bytes).await?;
    let upload = intake::persist(form.file, &state.config.upload_dir, &mut guard).await?;

    // ── 2. Route ──────────────────────────────────────────────────────────
    let job = state.converter.route(&upload, &form.target_format)?;
    match &job.output_dir {
        Some(dir) => guard.track_dir(dir),
        None => guard.track_file(&job.output_file),
    }
    info!(
        file = %upload.original_name,
        size = upload.size,
        kind = ?job.kind,
        target = %job.target,
        "Conversion accepted"
    );

    // ── 3. Convert ────────────────────────────────────────────────────────
    let artifact = state.converter.run(&job).await?;

    // ── 4. Deliver ────────────────────────────────────────────────────────
    Ok(delivery::attachment(artifact, guard).await?)
}

/// `GET /health`: `{"status": "ok", "version": "..."}`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
