//! Cast Resolver
//!
//! Turns whatever post link a user pasted into the canonical full-length
//! post hash, as reported by the social API. Supported shapes:
//!
//! - bare hash: `0x` + 40 hex (or 40 hex)
//! - client link: `https://<client>/<username>/0x<short-or-full-hash>`
//! - conversation link: `https://<client>/~/conversations/0x<hash>`
//! - content link: `https://<host>/content/<id>`
//!
//! The hash always comes from the API, never from the URL itself; a link the
//! API does not know resolves to `None`. Upstream failures propagate as
//! errors and are not retried here.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::Address;
use crate::content_id;
use crate::social::normalize::strip_hash_prefix;
use crate::social::{canonical_post_hash, SocialApi};
use crate::types::Result;

/// Fewest hex digits accepted as a short hash
const MIN_SHORT_HASH_DIGITS: usize = 6;

/// Parsed form of a post link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostReference {
    /// Full-length hash, from a bare hash or a link embedding one
    Hash(String),
    /// Client link carrying only an abbreviated hash
    ShortLink { url: String, short_hash: String },
    /// Sharing link for a tokenized post
    ContentLink { url: String, token: Address },
}

impl PostReference {
    /// Token address embedded in a content link
    pub fn token(&self) -> Option<Address> {
        match self {
            PostReference::ContentLink { token, .. } => Some(*token),
            _ => None,
        }
    }
}

fn hex_digits(segment: &str) -> Option<&str> {
    let digits = segment.strip_prefix("0x").or_else(|| segment.strip_prefix("0X"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(digits)
}

/// Classify a post link. `None` for anything unsupported; no network access.
pub fn parse_reference(input: &str) -> Option<PostReference> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(hash) = canonical_post_hash(input) {
        return Some(PostReference::Hash(hash));
    }

    let url = reqwest::Url::parse(input).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        ["content", id] => {
            let token = content_id::decode(id)?;
            Some(PostReference::ContentLink {
                url: input.to_string(),
                token,
            })
        }
        ["~", "conversations", hash] | [_, hash] => {
            let digits = hex_digits(hash)?;
            if let Some(full) = canonical_post_hash(digits) {
                Some(PostReference::Hash(full))
            } else if digits.len() >= MIN_SHORT_HASH_DIGITS && digits.len() < 40 {
                Some(PostReference::ShortLink {
                    url: input.to_string(),
                    short_hash: digits.to_ascii_lowercase(),
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Resolves post links to canonical post hashes.
pub struct CastResolver {
    social: Arc<dyn SocialApi>,
}

impl CastResolver {
    pub fn new(social: Arc<dyn SocialApi>) -> Self {
        Self { social }
    }

    /// Canonical hash for `reference`, or `None` if it cannot be resolved.
    pub async fn resolve(&self, reference: &str) -> Result<Option<String>> {
        let Some(parsed) = parse_reference(reference) else {
            debug!(reference = %reference, "Unsupported post reference");
            return Ok(None);
        };
        self.resolve_parsed(&parsed).await
    }

    /// Resolve an already-classified reference.
    pub async fn resolve_parsed(&self, reference: &PostReference) -> Result<Option<String>> {
        let cast = match reference {
            PostReference::Hash(hash) => self.social.cast_by_hash(hash).await?,
            PostReference::ShortLink { url, .. } | PostReference::ContentLink { url, .. } => {
                self.social.cast_by_url(url).await?
            }
        };

        let Some(cast) = cast else {
            debug!(reference = ?reference, "Post not found upstream");
            return Ok(None);
        };

        let Some(canonical) = canonical_post_hash(&cast.hash) else {
            warn!(hash = %cast.hash, "Upstream returned a malformed post hash");
            return Ok(None);
        };

        // The upstream answer must be consistent with what the link claimed
        let consistent = match reference {
            PostReference::Hash(hash) => strip_hash_prefix(hash) == strip_hash_prefix(&canonical),
            PostReference::ShortLink { short_hash, .. } => {
                strip_hash_prefix(&canonical).starts_with(short_hash.as_str())
            }
            PostReference::ContentLink { .. } => true,
        };
        if !consistent {
            warn!(
                reference = ?reference,
                canonical = %canonical,
                "Upstream hash does not match the link"
            );
            return Ok(None);
        }

        info!(canonical = %canonical, "Post resolved");
        Ok(Some(canonical))
    }
}
