//! Engage - engagement verification for tokenized social posts
//!
//! Engage resolves post links to canonical post hashes, verifies that users
//! liked, recast, commented on or bought into a post, and tracks each
//! engagement task through a small state machine.
//!
//! ## Components
//!
//! - **Content IDs**: reversible identifiers for tokenized posts
//! - **Tradability**: on-chain route probing with a TTL cache
//! - **Resolver**: post link → canonical hash via the social API
//! - **Verifiers**: social actions via the social API, purchases via `balanceOf`
//! - **Tasks**: per-user task progress with a server-side state machine

pub mod cache;
pub mod chain;
pub mod config;
pub mod content_id;
pub mod engine;
pub mod routes;
pub mod server;
pub mod services;
pub mod social;
pub mod task;
pub mod types;

pub use config::Args;
pub use engine::{EngagementEngine, VerifyRequest, VerifyResponse};
pub use server::{run, AppState};
pub use types::{ActionKind, EngineError, Result};
