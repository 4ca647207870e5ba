//! Shared helper functions for web routes.

use crate::error::HugoError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// HTML-escape a string to prevent XSS attacks.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// A failed lifecycle operation as a JSON `{error}` response. Requests that
/// don't fit the current status get 409; anything else is a 500.
#[derive(Debug)]
pub struct ApiError(pub HugoError);

impl From<HugoError> for ApiError {
    fn from(err: HugoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = if self.0.is_precondition() {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (code, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
