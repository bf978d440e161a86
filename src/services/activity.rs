//! Activity Verifier
//!
//! Checks that a user performed a social action on a resolved post.
//!
//! - **Like / Recast**: the user appears among the cast's reactors
//! - **Comment**: the user authored a reply whose parent is the post. Replies
//!   are merged from the conversation payload (direct replies and thread)
//!   and the dedicated replies endpoint before matching.
//!
//! `Ok(false)` is a confirmed negative. `Err` means no answer could be
//! obtained; callers must not record it as a negative.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::social::{hashes_match, normalize_replies, ReactionKind, Reply, SocialApi};
use crate::types::{ActionKind, EngineError, Result};

/// Verifies social actions against the social API.
pub struct ActivityVerifier {
    social: Arc<dyn SocialApi>,
}

impl ActivityVerifier {
    pub fn new(social: Arc<dyn SocialApi>) -> Self {
        Self { social }
    }

    /// Whether `user_id` performed `action` on the post `post_hash`.
    pub async fn verify(&self, post_hash: &str, user_id: u64, action: ActionKind) -> Result<bool> {
        let completed = match action {
            ActionKind::Like => self.reacted(post_hash, user_id, ReactionKind::Like).await?,
            ActionKind::Recast => self.reacted(post_hash, user_id, ReactionKind::Recast).await?,
            ActionKind::Comment => self.commented(post_hash, user_id).await?,
            ActionKind::Support => return Err(EngineError::UnsupportedAction(action)),
        };

        info!(
            post_hash = %post_hash,
            user_id,
            action = %action,
            completed,
            "Activity verified"
        );
        Ok(completed)
    }

    async fn reacted(&self, post_hash: &str, user_id: u64, kind: ReactionKind) -> Result<bool> {
        let reacted = self.social.has_reacted(post_hash, kind, user_id).await?;
        debug!(post_hash = %post_hash, kind = ?kind, user_id, reacted, "Checked reactions");
        Ok(reacted)
    }

    async fn commented(&self, post_hash: &str, user_id: u64) -> Result<bool> {
        let (conversation, replies) = tokio::join!(
            self.social.conversation(post_hash),
            self.social.replies(post_hash)
        );

        let mut merged: Vec<Reply> = Vec::new();
        let mut failure = None;
        for (source, result) in [("conversation", conversation), ("replies", replies)] {
            match result {
                Ok(Some(payload)) => merged.extend(normalize_replies(&payload)),
                Ok(None) => {}
                Err(e) => {
                    warn!(source, post_hash = %post_hash, error = %e, "Reply source failed");
                    failure = Some(e);
                }
            }
        }

        if merged.iter().any(|reply| is_reply_by(reply, post_hash, user_id)) {
            return Ok(true);
        }

        // A missing reply only counts as a negative if every source answered
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(false),
        }
    }
}

/// Reply authored by `user_id` directly under `post_hash`.
///
/// Replies without a parent hash come from per-cast listings and are
/// attributed to the queried post.
pub fn is_reply_by(reply: &Reply, post_hash: &str, user_id: u64) -> bool {
    reply.author_id == user_id
        && reply
            .parent_hash
            .as_deref()
            .map_or(true, |parent| hashes_match(parent, post_hash))
}
