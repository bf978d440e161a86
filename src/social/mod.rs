//! Social-graph read API
//!
//! The engine reads casts, reactions and replies through [`SocialApi`].
//! Payloads come back as raw JSON where the upstream shape is unstable;
//! [`normalize`] turns them into uniform records.

pub mod client;
pub mod normalize;

use serde::{Deserialize, Serialize};

pub use client::{HttpSocialApi, SocialApiConfig};
pub use normalize::{canonical_post_hash, hashes_match, normalize_replies, Reply};

/// Reaction types the API can list for a cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Recast,
}

impl ReactionKind {
    /// Query value for the reactions endpoint
    pub fn query_value(&self) -> &'static str {
        match self {
            ReactionKind::Like => "likes",
            ReactionKind::Recast => "recasts",
        }
    }
}

/// Minimal view of a cast returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastSummary {
    /// Hash exactly as the API reported it
    pub hash: String,
    pub author_id: Option<u64>,
}

/// Errors from the social API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocialApiError {
    #[error("social API unavailable: {0}")]
    Unavailable(String),

    #[error("social API timed out")]
    Timeout,

    #[error("social API rejected request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected social API response: {0}")]
    InvalidResponse(String),
}

impl SocialApiError {
    /// Whether the failure is on the upstream side and worth retrying later
    pub fn is_transient(&self) -> bool {
        match self {
            SocialApiError::Unavailable(_) | SocialApiError::Timeout => true,
            SocialApiError::Rejected { status, .. } => *status == 429 || *status >= 500,
            SocialApiError::InvalidResponse(_) => false,
        }
    }
}

/// Read access to casts, reactions and replies.
///
/// "Not found" is `Ok(None)` (or an empty list); `Err` is reserved for
/// failures to get an answer at all.
#[async_trait::async_trait]
pub trait SocialApi: Send + Sync {
    /// Look up a cast by a client URL (full or short-hash form).
    async fn cast_by_url(&self, url: &str) -> Result<Option<CastSummary>, SocialApiError>;

    /// Look up a cast by its hash.
    async fn cast_by_hash(&self, hash: &str) -> Result<Option<CastSummary>, SocialApiError>;

    /// Ids of every user who left a reaction of `kind` on the cast.
    ///
    /// A listing that cannot be read to the end is an error, never a
    /// shortened list.
    async fn reactor_ids(&self, hash: &str, kind: ReactionKind)
        -> Result<Vec<u64>, SocialApiError>;

    /// Whether `user_id` left a reaction of `kind` on the cast.
    ///
    /// Implementations may stop reading the listing once the user is found.
    async fn has_reacted(
        &self,
        hash: &str,
        kind: ReactionKind,
        user_id: u64,
    ) -> Result<bool, SocialApiError> {
        Ok(self.reactor_ids(hash, kind).await?.contains(&user_id))
    }

    /// Conversation payload for a cast (direct replies and thread).
    async fn conversation(&self, hash: &str) -> Result<Option<serde_json::Value>, SocialApiError>;

    /// Payload of the dedicated replies endpoint for a cast.
    async fn replies(&self, hash: &str) -> Result<Option<serde_json::Value>, SocialApiError>;
}
