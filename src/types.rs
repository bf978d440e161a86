//! Shared types and the crate-wide error

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chain::ChainError;
use crate::social::SocialApiError;
use crate::task::{StoreError, TransitionError};

/// Social or on-chain action a task requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Recast,
    Comment,
    /// Buy of the post's token, confirmed on-chain rather than via the social API
    Support,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Recast => "recast",
            ActionKind::Comment => "comment",
            ActionKind::Support => "support",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" | "likes" => Ok(ActionKind::Like),
            "recast" | "recasts" => Ok(ActionKind::Recast),
            "comment" | "reply" => Ok(ActionKind::Comment),
            "support" | "buy" => Ok(ActionKind::Support),
            other => Err(EngineError::InvalidInput(format!("unknown action kind: {other}"))),
        }
    }
}

/// Errors surfaced by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Action {0} cannot be verified by this component")]
    UnsupportedAction(ActionKind),

    #[error("Chain read failed: {0}")]
    Chain(#[from] ChainError),

    #[error("Social API failed: {0}")]
    Social(#[from] SocialApiError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Progress store failed: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Chain(e) => e.is_retryable(),
            EngineError::Social(e) => e.is_transient(),
            EngineError::Store(StoreError::Backend(_)) => true,
            EngineError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
