//! HTTP surface: router, handlers, and the pieces around them.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /convert` | [`handlers::convert_file`] |
//! | `GET /health`   | [`handlers::health`] |
//! | anything else   | static client UI from `static_dir`, falling back to `index.html` |

pub mod delivery;
pub mod error;
pub mod handlers;
pub mod listen;
pub mod state;

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::error::ConvertError;
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart framing and the `targetFormat` field on top of the
/// file size ceiling. The file itself is capped by the intake.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Build the router around an already-constructed state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = &state.config.static_dir;
    let assets = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
    let body_limit =
        usize::try_from(state.config.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX);

    Router::new()
        .route("/convert", post(handlers::convert_file))
        .route("/health", get(handlers::health))
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Browsers only let scripts read `Content-Disposition` when it is exposed.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// Create the uploads and outputs scratch areas if missing.
pub async fn prepare_scratch_dirs(config: &ServerConfig) -> Result<(), ConvertError> {
    for dir in [&config.upload_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConvertError::io(dir, e))?;
    }
    info!(
        uploads = %config.upload_dir.display(),
        outputs = %config.output_dir.display(),
        "Scratch directories ready"
    );
    Ok(())
}

/// Everything needed to serve: scratch directories, converter, router.
pub async fn app(config: ServerConfig) -> Result<Router, ConvertError> {
    prepare_scratch_dirs(&config).await?;
    let config = Arc::new(config);
    let converter = Converter::from_config(Arc::clone(&config)).await;
    Ok(build_router(Arc::new(AppState { config, converter })))
}
