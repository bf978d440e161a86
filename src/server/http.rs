//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainReader, JsonRpcClient};
use crate::config::Args;
use crate::engine::EngagementEngine;
use crate::routes;
use crate::services::{spawn_cache_cleanup_task, TradabilityOracle};
use crate::social::{HttpSocialApi, SocialApi};
use crate::task::{InMemoryProgressStore, ProgressStore};
use crate::types::{EngineError, Result};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub engine: Arc<EngagementEngine>,
    /// Tradability oracle, shared with the engine
    pub oracle: Arc<TradabilityOracle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, engine: Arc<EngagementEngine>, oracle: Arc<TradabilityOracle>) -> Self {
        Self {
            args,
            engine,
            oracle,
            started_at: Instant::now(),
        }
    }

    /// Build clients and services from configuration
    pub fn from_args(args: Args) -> Result<Self> {
        let chain: Arc<dyn ChainReader> = Arc::new(JsonRpcClient::new(args.rpc_config())?);
        let social: Arc<dyn SocialApi> = Arc::new(HttpSocialApi::new(args.social_config())?);
        let oracle_config = args
            .oracle_config()
            .map_err(|e| EngineError::InvalidInput(format!("oracle configuration: {e}")))?;
        let oracle = Arc::new(TradabilityOracle::new(oracle_config, Arc::clone(&chain)));
        let store: Arc<dyn ProgressStore> = Arc::new(InMemoryProgressStore::new(args.store_config()));

        let engine = Arc::new(EngagementEngine::new(social, chain, Arc::clone(&oracle), store));
        Ok(Self::new(args, engine, oracle))
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Engage listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - social API key not required");
    }

    spawn_cache_cleanup_task(Arc::clone(&state.oracle), Duration::from_secs(60));
    info!(
        "Tradability cache enabled (ttl {}s, max {} entries)",
        state.oracle.config().cache_ttl.as_secs(),
        state.oracle.config().max_cache_entries
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, "/api/verify") => match read_body(req).await {
            Ok(body) => routes::handle_verify(Arc::clone(&state), &body).await,
            Err(response) => response,
        },

        (Method::POST, "/api/tasks") => match read_body(req).await {
            Ok(body) => routes::handle_register_task(Arc::clone(&state), &body).await,
            Err(response) => response,
        },

        (Method::POST, "/api/tasks/open") => match read_body(req).await {
            Ok(body) => routes::handle_open_task(Arc::clone(&state), &body).await,
            Err(response) => response,
        },

        (Method::POST, "/api/tradable") => match read_body(req).await {
            Ok(body) => routes::handle_tradable(Arc::clone(&state), &body).await,
            Err(response) => response,
        },

        (Method::GET, "/api/content") => {
            routes::handle_content_lookup(Arc::clone(&state), query.as_deref())
        }

        (Method::GET, p) if p.starts_with("/api/content/") => {
            let id = &p["/api/content/".len()..];
            if id.is_empty() || id.contains('/') {
                not_found_response(p)
            } else {
                routes::handle_content_decode(id)
            }
        }

        (Method::GET, p) if p.starts_with("/api/tasks/") => {
            let user_id = &p["/api/tasks/".len()..];
            if user_id.is_empty() || user_id.contains('/') {
                not_found_response(p)
            } else {
                routes::handle_progress(Arc::clone(&state), user_id).await
            }
        }

        (_, p) => not_found_response(p),
    };

    debug!(status = %response.status(), path = %path, "Request handled");
    Ok(response)
}

/// Collect a request body, bounded by `MAX_BODY_BYTES`
async fn read_body(req: Request<Incoming>) -> std::result::Result<Bytes, Response<Full<Bytes>>> {
    match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => {
            warn!("Request body error: {}", e);
            Err(bad_request_response("Failed to read request body"))
        }
    }
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
