//! Tradability Oracle
//!
//! Decides whether a token can actually be bought before it is offered as a
//! support task, by asking the DEX quoter for a route from the quote
//! currency to the token.
//!
//! ## Probe Order
//!
//! 1. Direct single-hop quote at each fee tier, in configured order
//! 2. Two-hop quote through the intermediate token: for each hop-1 tier that
//!    yields a positive amount, each hop-2 tier
//!
//! The first positive quote wins. Quoters revert when a pool does not exist,
//! so any failed quote call means "no route at this tier", not an error.
//!
//! Results are cached per token for the cache TTL (default 10 minutes).
//! Concurrent first lookups for the same token each probe independently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::{CacheStatsSnapshot, Clock, SystemClock, TtlCache, TtlCacheConfig};
use crate::chain::abi::{decode_first_uint, encode_quote_exact_input_single};
use crate::chain::{Address, ChainReader};

/// Default QuoterV2 deployment on Base
pub const DEFAULT_QUOTER: &str = "0x3d4e44eb1374240ce5f1b871ab261cd16335b76a";
/// USDC on Base
pub const DEFAULT_QUOTE_TOKEN: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
/// WETH on Base
pub const DEFAULT_INTERMEDIATE_TOKEN: &str = "0x4200000000000000000000000000000000000006";
/// 0.3% first, then 1%, then 0.05%
pub const DEFAULT_FEE_TIERS: [u32; 3] = [3000, 10000, 500];

/// Oracle configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Quoting contract
    pub quoter: Address,
    /// Currency buyers pay with
    pub quote_token: Address,
    /// Hub token for two-hop routes
    pub intermediate_token: Address,
    /// Pool fee tiers to probe, in order
    pub fee_tiers: Vec<u32>,
    /// Lifetime of a cached answer (default: 10 minutes)
    pub cache_ttl: Duration,
    /// Maximum cached tokens
    pub max_cache_entries: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            quoter: Address::parse(DEFAULT_QUOTER).unwrap_or(Address::ZERO),
            quote_token: Address::parse(DEFAULT_QUOTE_TOKEN).unwrap_or(Address::ZERO),
            intermediate_token: Address::parse(DEFAULT_INTERMEDIATE_TOKEN)
                .unwrap_or(Address::ZERO),
            fee_tiers: DEFAULT_FEE_TIERS.to_vec(),
            cache_ttl: Duration::from_secs(600),
            max_cache_entries: 10_000,
        }
    }
}

/// Cached tradability answer for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradabilityRecord {
    pub token_address: Address,
    pub tradable: bool,
    pub checked_at: DateTime<Utc>,
}

/// Route found by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProbe {
    Direct { fee: u32 },
    TwoHop { first_fee: u32, second_fee: u32 },
    NoRoute,
}

impl RouteProbe {
    pub fn is_tradable(&self) -> bool {
        !matches!(self, RouteProbe::NoRoute)
    }
}

/// Answers "can this token be bought?" with bounded on-chain probing.
pub struct TradabilityOracle {
    config: OracleConfig,
    chain: Arc<dyn ChainReader>,
    cache: TtlCache<TradabilityRecord>,
}

impl TradabilityOracle {
    pub fn new(config: OracleConfig, chain: Arc<dyn ChainReader>) -> Self {
        Self::with_clock(config, chain, Arc::new(SystemClock))
    }

    /// Build with an explicit clock for cache expiry.
    pub fn with_clock(
        config: OracleConfig,
        chain: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = TtlCache::with_clock(
            TtlCacheConfig {
                ttl: config.cache_ttl,
                max_entries: config.max_cache_entries,
            },
            clock,
        );
        Self { config, chain, cache }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Whether `token` has a buy route for `quote_input_amount`, an integer
    /// count of the quote token's smallest unit.
    ///
    /// Malformed input, decimal amounts included, is `false` without touching the chain.
    pub async fn is_tradable(&self, token: &str, quote_input_amount: &str) -> bool {
        self.check(token, quote_input_amount)
            .await
            .map(|record| record.tradable)
            .unwrap_or(false)
    }

    /// Like [`is_tradable`](Self::is_tradable) but returns the cached record.
    ///
    /// `None` means the input was malformed and nothing was probed.
    pub async fn check(&self, token: &str, quote_input_amount: &str) -> Option<TradabilityRecord> {
        let Ok(token_address) = Address::parse(token) else {
            debug!(token = %token, "Rejecting malformed token address");
            return None;
        };
        let amount = match quote_input_amount.trim().parse::<u128>() {
            Ok(amount) if amount > 0 => amount,
            _ => {
                debug!(amount = %quote_input_amount, "Rejecting malformed quote amount");
                return None;
            }
        };

        let key = token_address.to_string();
        if let Some(record) = self.cache.get(&key) {
            debug!(token = %key, tradable = record.tradable, "Tradability served from cache");
            return Some(record);
        }

        let route = self.probe(&token_address, amount).await;
        let record = TradabilityRecord {
            token_address,
            tradable: route.is_tradable(),
            checked_at: Utc::now(),
        };

        info!(token = %key, route = ?route, "Tradability probed");
        self.cache.insert(key, record.clone());
        Some(record)
    }

    /// Probe the quoter for a route, without consulting the cache.
    pub async fn probe(&self, token: &Address, amount: u128) -> RouteProbe {
        let quote_token = self.config.quote_token;
        let hub = self.config.intermediate_token;

        for &fee in &self.config.fee_tiers {
            if self.quote(&quote_token, token, amount, fee).await.is_some() {
                return RouteProbe::Direct { fee };
            }
        }

        if *token == hub || *token == quote_token {
            return RouteProbe::NoRoute;
        }

        for &first_fee in &self.config.fee_tiers {
            let Some(intermediate) = self.quote(&quote_token, &hub, amount, first_fee).await else {
                continue;
            };
            for &second_fee in &self.config.fee_tiers {
                if self.quote(&hub, token, intermediate, second_fee).await.is_some() {
                    return RouteProbe::TwoHop {
                        first_fee,
                        second_fee,
                    };
                }
            }
        }

        RouteProbe::NoRoute
    }

    /// Drop expired cache entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Positive output amount for one pool, or `None` for no route.
    async fn quote(
        &self,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
        fee: u32,
    ) -> Option<u128> {
        let data = encode_quote_exact_input_single(token_in, token_out, amount_in, fee);
        match self.chain.call(&self.config.quoter, &data).await {
            Ok(output) => match decode_first_uint(&output) {
                Ok(amount) if amount > 0 => Some(amount),
                Ok(_) => None,
                Err(e) => {
                    debug!(fee, error = %e, "Unreadable quote, treating as no route");
                    None
                }
            },
            Err(e) => {
                debug!(
                    token_in = %token_in,
                    token_out = %token_out,
                    fee,
                    error = %e,
                    "Quote failed, treating as no route"
                );
                None
            }
        }
    }
}

/// Periodically drop expired tradability answers.
pub fn spawn_cache_cleanup_task(oracle: Arc<TradabilityOracle>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = oracle.purge_expired();
            let stats = oracle.cache_stats();
            debug!(
                removed,
                entries = stats.entries,
                hits = stats.hits,
                misses = stats.misses,
                "Tradability cache cleanup completed"
            );
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Tradability cache cleanup task started"
    );
}
