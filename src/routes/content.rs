//! Content identifier endpoints
//!
//! - GET /api/content/{id} - decode an identifier to its token address
//! - GET /api/content?address=0x... - build the identifier and share URL

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{error_response, json_response};
use crate::chain::Address;
use crate::content_id;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct DecodedContent {
    pub address: Address,
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct EncodedContent {
    pub id: String,
    pub url: String,
}

/// First value of `name` in a raw query string
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != name {
            return None;
        }
        urlencoding::decode(&value.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

pub fn handle_content_decode(id: &str) -> Response<Full<Bytes>> {
    let id = urlencoding::decode(id)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| id.to_string());

    match content_id::decode_parts(&id) {
        Some(parts) => json_response(
            StatusCode::OK,
            &DecodedContent {
                address: parts.address,
                network: parts.network,
            },
        ),
        None => {
            debug!(id = %id, "Undecodable content identifier");
            error_response(StatusCode::NOT_FOUND, "unknown content identifier")
        }
    }
}

pub fn handle_content_lookup(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let Some(raw) = query.and_then(|q| query_param(q, "address")) else {
        return error_response(StatusCode::BAD_REQUEST, "address query parameter is required");
    };
    let Ok(address) = Address::parse(&raw) else {
        return error_response(StatusCode::BAD_REQUEST, "address must be 0x + 40 hex digits");
    };

    json_response(
        StatusCode::OK,
        &EncodedContent {
            id: content_id::encode(&address),
            url: content_id::content_url(&state.args.content_host, &address),
        },
    )
}
