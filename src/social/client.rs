//! HTTP client for the hosted social-graph API
//!
//! Speaks the v2 REST surface (`/v2/farcaster/...`). A 404 on a lookup is a
//! clean "not found"; 429 and 5xx are upstream failures. Requests carry a
//! client-side timeout since the API itself does not bound latency.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::normalize::{author_id, next_cursor, normalize_reactor_ids};
use super::{CastSummary, ReactionKind, SocialApi, SocialApiError};

/// Configuration for [`HttpSocialApi`]
#[derive(Debug, Clone)]
pub struct SocialApiConfig {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// API key sent as `x-api-key`
    pub api_key: Option<String>,
    /// Per-request timeout (default: 10 seconds)
    pub request_timeout: Duration,
    /// Page size for reaction listings
    pub page_size: u32,
    /// Upper bound on pages fetched for one reaction listing
    pub max_pages: u32,
    /// Path of the dedicated replies endpoint
    pub replies_path: String,
}

impl Default for SocialApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.neynar.com".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
            page_size: 100,
            max_pages: 20,
            replies_path: "/v2/farcaster/cast/replies".to_string(),
        }
    }
}

/// Social API over HTTPS
pub struct HttpSocialApi {
    config: SocialApiConfig,
    http_client: reqwest::Client,
}

impl HttpSocialApi {
    pub fn new(config: SocialApiConfig) -> Result<Self, SocialApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("engage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SocialApiError::Unavailable(e.to_string()))?;

        Ok(Self { config, http_client })
    }

    pub fn config(&self) -> &SocialApiConfig {
        &self.config
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let query = query
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            format!("{base}{path}")
        } else {
            format!("{base}{path}?{query}")
        }
    }

    /// GET a JSON document; `Ok(None)` on 404.
    async fn get_json(&self, url: &str) -> Result<Option<Value>, SocialApiError> {
        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SocialApiError::Timeout
            } else {
                SocialApiError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(url = %url, "Social API returned 404");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Social API request failed");
            return Err(SocialApiError::Rejected {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        response
            .json::<Value>()
            .await
            .map(Some)
            .map_err(|e| SocialApiError::InvalidResponse(e.to_string()))
    }

    async fn reactions_page(
        &self,
        hash: &str,
        kind: ReactionKind,
        cursor: Option<String>,
    ) -> Result<Option<Value>, SocialApiError> {
        let mut query = vec![
            ("hash", hash.to_string()),
            ("types", kind.query_value().to_string()),
            ("limit", self.config.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        self.get_json(&self.url("/v2/farcaster/reactions/cast", &query))
            .await
    }

    async fn lookup_cast(
        &self,
        identifier: &str,
        kind: &str,
    ) -> Result<Option<CastSummary>, SocialApiError> {
        let url = self.url(
            "/v2/farcaster/cast",
            &[("identifier", identifier.to_string()), ("type", kind.to_string())],
        );
        Ok(self.get_json(&url).await?.as_ref().and_then(cast_summary))
    }
}

/// Walk a paginated reaction listing.
///
/// Stops early once `stop_at` shows up. Running out of pages while the API
/// still offers a cursor is an error: the missing pages could hold the user.
async fn collect_reactors<F, Fut>(
    max_pages: u32,
    stop_at: Option<u64>,
    mut fetch_page: F,
) -> Result<Vec<u64>, SocialApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Option<Value>, SocialApiError>>,
{
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..max_pages {
        let Some(page) = fetch_page(cursor.take()).await? else {
            return Ok(ids);
        };

        ids.extend(normalize_reactor_ids(&page));
        if stop_at.is_some_and(|id| ids.contains(&id)) {
            return Ok(ids);
        }

        cursor = next_cursor(&page);
        if cursor.is_none() {
            return Ok(ids);
        }
    }

    warn!(max_pages, collected = ids.len(), "Reaction listing exceeds page limit");
    Err(SocialApiError::InvalidResponse(format!(
        "reaction listing truncated after {max_pages} pages"
    )))
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Pull the cast out of a lookup response.
fn cast_summary(value: &Value) -> Option<CastSummary> {
    let cast = value.get("cast").unwrap_or(value);
    let hash = cast.get("hash").and_then(Value::as_str)?;
    Some(CastSummary {
        hash: hash.to_string(),
        author_id: author_id(cast),
    })
}

#[async_trait::async_trait]
impl SocialApi for HttpSocialApi {
    async fn cast_by_url(&self, url: &str) -> Result<Option<CastSummary>, SocialApiError> {
        self.lookup_cast(url, "url").await
    }

    async fn cast_by_hash(&self, hash: &str) -> Result<Option<CastSummary>, SocialApiError> {
        self.lookup_cast(hash, "hash").await
    }

    async fn reactor_ids(
        &self,
        hash: &str,
        kind: ReactionKind,
    ) -> Result<Vec<u64>, SocialApiError> {
        collect_reactors(self.config.max_pages, None, move |cursor| {
            self.reactions_page(hash, kind, cursor)
        })
        .await
    }

    async fn has_reacted(
        &self,
        hash: &str,
        kind: ReactionKind,
        user_id: u64,
    ) -> Result<bool, SocialApiError> {
        let ids = collect_reactors(self.config.max_pages, Some(user_id), move |cursor| {
            self.reactions_page(hash, kind, cursor)
        })
        .await?;
        Ok(ids.contains(&user_id))
    }

    async fn conversation(&self, hash: &str) -> Result<Option<Value>, SocialApiError> {
        let url = self.url(
            "/v2/farcaster/cast/conversation",
            &[
                ("identifier", hash.to_string()),
                ("type", "hash".to_string()),
                ("reply_depth", "2".to_string()),
                ("include_chronological_parent_casts", "false".to_string()),
                ("limit", "50".to_string()),
            ],
        );
        self.get_json(&url).await
    }

    async fn replies(&self, hash: &str) -> Result<Option<Value>, SocialApiError> {
        let url = self.url(
            &self.config.replies_path,
            &[("hash", hash.to_string()), ("limit", "100".to_string())],
        );
        self.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_encodes_query() {
        let api = HttpSocialApi::new(SocialApiConfig {
            base_url: "https://api.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = api.url(
            "/v2/farcaster/cast",
            &[
                ("identifier", "https://warpcast.com/alice/0xabc".to_string()),
                ("type", "url".to_string()),
            ],
        );
        assert_eq!(
            url,
            "https://api.example.com/v2/farcaster/cast?identifier=https%3A%2F%2Fwarpcast.com%2Falice%2F0xabc&type=url"
        );
        assert_eq!(api.url("/health", &[]), "https://api.example.com/health");
    }

    #[test]
    fn test_cast_summary_from_lookup() {
        let value = json!({
            "cast": {
                "hash": "0xABCdef0123456789abcdef0123456789abcdef01",
                "author": { "fid": 3 }
            }
        });
        assert_eq!(
            cast_summary(&value),
            Some(CastSummary {
                hash: "0xABCdef0123456789abcdef0123456789abcdef01".to_string(),
                author_id: Some(3),
            })
        );
        assert_eq!(cast_summary(&json!({ "cast": {} })), None);
    }

    /// Endless listing: page `n` holds user `n` and a cursor to page `n + 1`
    fn endless_page(cursor: Option<String>) -> Value {
        let n = cursor.and_then(|c| c.parse::<u64>().ok()).unwrap_or(1);
        json!({
            "reactions": [ { "user": { "fid": n } } ],
            "next": { "cursor": (n + 1).to_string() }
        })
    }

    #[tokio::test]
    async fn test_reactors_follow_cursor_to_last_page() {
        let mut fetched = Vec::new();
        let ids = collect_reactors(5, None, |cursor: Option<String>| {
            fetched.push(cursor.clone());
            async move {
                Ok(Some(match cursor.as_deref() {
                    None => json!({ "reactions": [ { "user": { "fid": 1 } } ], "next": { "cursor": "p2" } }),
                    _ => json!({ "reactions": [ { "user": { "fid": 2 } } ], "next": { "cursor": null } }),
                }))
            }
        })
        .await
        .unwrap();

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(fetched, vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_reactors_past_page_limit_is_error() {
        let err = collect_reactors(3, None, |cursor| async move { Ok(Some(endless_page(cursor))) })
            .await
            .unwrap_err();
        assert!(matches!(err, SocialApiError::InvalidResponse(_)));
        assert!(!err.is_transient());

        // A user beyond the last fetched page is not reported as absent
        let err = collect_reactors(3, Some(9), |cursor| async move { Ok(Some(endless_page(cursor))) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn test_reactors_stop_once_user_found() {
        let mut pages = 0;
        let ids = collect_reactors(20, Some(2), |cursor| {
            pages += 1;
            async move { Ok(Some(endless_page(cursor))) }
        })
        .await
        .unwrap();

        assert_eq!(pages, 2);
        assert!(ids.contains(&2));
    }

    #[tokio::test]
    async fn test_reactors_missing_listing_is_empty() {
        let ids = collect_reactors(3, None, |_| async { Ok(None) }).await.unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_error_transience() {
        assert!(SocialApiError::Timeout.is_transient());
        assert!(SocialApiError::Rejected { status: 503, message: String::new() }.is_transient());
        assert!(SocialApiError::Rejected { status: 429, message: String::new() }.is_transient());
        assert!(!SocialApiError::Rejected { status: 400, message: String::new() }.is_transient());
    }
}
