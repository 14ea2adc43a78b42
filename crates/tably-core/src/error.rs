use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Build the platform's standard JSON error response: `{kind, message}` with
/// the given status. Every service error type funnels through this so clients
/// see one shape.
///
/// Only 5xx are logged here — tower-http's TraceLayer already records
/// method/uri/status for all requests, and 4xx are expected client errors.
pub fn error_response(status: StatusCode, kind: &'static str, message: String) -> Response {
    if status.is_server_error() {
        tracing::error!(error = %message, kind, "internal error");
    }
    let body = serde_json::json!({
        "kind": kind,
        "message": message,
    });
    (status, axum::Json(body)).into_response()
}
