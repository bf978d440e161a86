//! Services layer
//!
//! Business logic that coordinates the chain reader, the social API and the
//! caches.
//!
//! ## Services
//!
//! - **TradabilityOracle**: decides whether a token can be bought, via direct
//!   or two-hop quotes, with a TTL cache
//! - **CastResolver**: turns post links into canonical post hashes
//! - **ActivityVerifier**: checks likes, recasts and comments
//! - **PurchaseVerifier**: checks token balances for support tasks

pub mod activity;
pub mod purchase;
pub mod resolver;
pub mod tradability;

pub use activity::{is_reply_by, ActivityVerifier};
pub use purchase::PurchaseVerifier;
pub use resolver::{parse_reference, CastResolver, PostReference};
pub use tradability::{
    spawn_cache_cleanup_task, OracleConfig, RouteProbe, TradabilityOracle, TradabilityRecord,
};
