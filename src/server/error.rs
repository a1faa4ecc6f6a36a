//! HTTP mapping of [`ConvertError`].
//!
//! Handlers return `Result<_, ApiError>`. Client input errors become 400
//! with their message verbatim; everything else becomes 500 with a
//! "Conversion failed: …" message. The body is always `{ "error": "…" }`.

use crate::error::ConvertError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError(pub ConvertError);

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self.0, "Conversion request failed");
        } else {
            warn!(error = %self.0, "Conversion request rejected");
        }
        let body = Json(json!({ "error": self.0.client_message() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn client_errors_are_400() {
        let e = ApiError(ConvertError::FileTooLarge { limit_mb: 20 });
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError(ConvertError::NoFile).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tool_and_output_errors_are_500() {
        let cases = [
            ConvertError::ToolNotFound { tool: "soffice".into() },
            ConvertError::ToolTimeout { tool: "soffice".into(), secs: 60 },
            ConvertError::NoOutput { expected: PathBuf::from("out.docx") },
        ];
        for e in cases {
            assert_eq!(ApiError(e).status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn body_carries_error_field() {
        let resp = ApiError(ConvertError::NoFile).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v["error"].as_str().unwrap().starts_with("No file uploaded"));
    }
}
