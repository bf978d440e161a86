//! In-process caching

pub mod ttl;

pub use ttl::{CacheStatsSnapshot, Clock, ManualClock, SystemClock, TtlCache, TtlCacheConfig};
