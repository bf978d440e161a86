//! HTTP routes for Engage

pub mod content;
pub mod health;
pub mod tasks;
pub mod tradable;
pub mod verify;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

pub use content::{handle_content_decode, handle_content_lookup};
pub use health::{health_check, version_info};
pub use tasks::{handle_open_task, handle_progress, handle_register_task};
pub use tradable::handle_tradable;
pub use verify::handle_verify;

/// JSON response with CORS and no caching
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, body) = match serde_json::to_string(body) {
        Ok(json) => (status, json),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string(),
        ),
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Cache-Control", "no-store")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// `{"error": ..., "message": ...}` with the given status
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    });
    json_response(status, &body)
}
