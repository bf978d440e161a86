//! Tradability endpoint (POST /api/tradable)
//!
//! `quoteInputAmount` is an integer count of the quote currency's smallest
//! unit (USDC has 6 decimals, so one USDC is `"1000000"`). Decimal strings
//! such as `"1.5"` are not scaled; they are malformed and answer
//! `{"tradable": false}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::{error_response, json_response};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradableRequest {
    pub token_address: String,
    /// Smallest-unit integer amount of the quote currency, as a string or a
    /// JSON integer
    pub quote_input_amount: Value,
}

#[derive(Debug, Serialize)]
pub struct TradableResponse {
    pub tradable: bool,
}

/// Amount as text; anything other than a string or integer becomes empty
/// and is rejected by the oracle.
fn amount_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_u64() => n.to_string(),
        _ => String::new(),
    }
}

pub async fn handle_tradable(state: Arc<AppState>, body: &[u8]) -> Response<Full<Bytes>> {
    let request: TradableRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Tradable request JSON parse error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };

    let tradable = state
        .engine
        .support_task_eligible(&request.token_address, &amount_text(&request.quote_input_amount))
        .await;
    json_response(StatusCode::OK, &TradableResponse { tradable })
}
