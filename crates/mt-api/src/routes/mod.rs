use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};

pub mod campaigns;
pub mod track;

/// Build error response with JSON payload
pub fn error_response(status: StatusCode, error: &str, detail: &str) -> Response {
    let body = serde_json::json!({
        "error": error,
        "detail": detail,
    });

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}
