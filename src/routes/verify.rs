//! Verification endpoint (POST /api/verify)
//!
//! Always answers 200 with a `VerifyResponse` once the body parses; failures
//! of the upstream services are reported in its `error` field so clients can
//! tell "try again" apart from "not done".

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{error_response, json_response};
use crate::engine::VerifyRequest;
use crate::server::AppState;

pub async fn handle_verify(state: Arc<AppState>, body: &[u8]) -> Response<Full<Bytes>> {
    let request: VerifyRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Verify request JSON parse error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };

    debug!(
        user_id = request.user_id,
        action = %request.action_kind,
        task_id = ?request.task_id,
        "Processing verification request"
    );

    let response = state.engine.verify_request(&request).await;
    json_response(StatusCode::OK, &response)
}
