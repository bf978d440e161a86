//! Configuration for Engage
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::chain::{Address, AddressError, RpcConfig};
use crate::services::tradability::{
    OracleConfig, DEFAULT_INTERMEDIATE_TOKEN, DEFAULT_QUOTER, DEFAULT_QUOTE_TOKEN,
};
use crate::social::SocialApiConfig;
use crate::task::StoreConfig;

/// Engage - engagement verification service for tokenized posts
#[derive(Parser, Debug, Clone)]
#[command(name = "engage")]
#[command(about = "Resolves tokenized posts and verifies social engagement")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (social API key optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Host used when building content URLs
    #[arg(long, env = "CONTENT_HOST", default_value = "base.app")]
    pub content_host: String,

    /// Seconds before an unfinished verification may be retried. Must exceed
    /// the longest reaction listing (SOCIAL_MAX_PAGES x SOCIAL_TIMEOUT_MS).
    #[arg(long, env = "VERIFYING_LEASE_SECS", default_value = "300")]
    pub verifying_lease_secs: u64,

    /// Chain RPC configuration
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Social API configuration
    #[command(flatten)]
    pub social: SocialArgs,

    /// Tradability oracle configuration
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// Chain RPC configuration
#[derive(Parser, Debug, Clone)]
pub struct ChainArgs {
    /// JSON-RPC endpoint for Base
    #[arg(long, env = "RPC_URL", default_value = "https://mainnet.base.org")]
    pub rpc_url: String,

    /// Per-call timeout in milliseconds
    #[arg(long, env = "RPC_TIMEOUT_MS", default_value = "12000")]
    pub rpc_timeout_ms: u64,

    /// Retries after a transport failure or timeout
    #[arg(long, env = "RPC_RETRIES", default_value = "1")]
    pub rpc_retries: u32,

    /// Delay between retries in milliseconds
    #[arg(long, env = "RPC_BACKOFF_MS", default_value = "500")]
    pub rpc_backoff_ms: u64,
}

/// Social API configuration
#[derive(Parser, Debug, Clone)]
pub struct SocialArgs {
    /// Social API base URL
    #[arg(long, env = "SOCIAL_API_URL", default_value = "https://api.neynar.com")]
    pub social_api_url: String,

    /// Social API key (required outside dev mode)
    #[arg(long, env = "SOCIAL_API_KEY")]
    pub social_api_key: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, env = "SOCIAL_TIMEOUT_MS", default_value = "10000")]
    pub social_timeout_ms: u64,

    /// Reactions fetched per page
    #[arg(long, env = "SOCIAL_PAGE_SIZE", default_value = "100")]
    pub social_page_size: u32,

    /// Maximum pages fetched per reaction listing
    #[arg(long, env = "SOCIAL_MAX_PAGES", default_value = "20")]
    pub social_max_pages: u32,

    /// Path of the replies endpoint
    #[arg(long, env = "SOCIAL_REPLIES_PATH", default_value = "/v2/farcaster/cast/replies")]
    pub social_replies_path: String,
}

/// Tradability oracle configuration
#[derive(Parser, Debug, Clone)]
pub struct OracleArgs {
    /// Quoting contract address
    #[arg(long, env = "QUOTER_ADDRESS", default_value = DEFAULT_QUOTER)]
    pub quoter_address: String,

    /// Currency buyers pay with
    #[arg(long, env = "QUOTE_TOKEN", default_value = DEFAULT_QUOTE_TOKEN)]
    pub quote_token: String,

    /// Hub token for two-hop routes
    #[arg(long, env = "INTERMEDIATE_TOKEN", default_value = DEFAULT_INTERMEDIATE_TOKEN)]
    pub intermediate_token: String,

    /// Comma-separated pool fee tiers, probed in order (at most three)
    #[arg(long, env = "FEE_TIERS", value_delimiter = ',', default_value = "3000,10000,500")]
    pub fee_tiers: Vec<u32>,

    /// Lifetime of a cached tradability answer in seconds
    #[arg(long, env = "TRADABLE_CACHE_TTL_SECS", default_value = "600")]
    pub tradable_cache_ttl_secs: u64,

    /// Maximum cached tradability answers
    #[arg(long, env = "TRADABLE_CACHE_MAX_ENTRIES", default_value = "10000")]
    pub tradable_cache_max_entries: usize,
}

/// Largest Uniswap v3 fee value (100%)
const MAX_FEE: u32 = 1_000_000;

/// Fee tiers probed per hop
const MAX_FEE_TIERS: usize = 3;

fn check_url(name: &str, value: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{name} must be an http(s) URL"));
    }
    Ok(())
}

fn check_address(name: &str, value: &str) -> Result<(), String> {
    Address::parse(value)
        .map(|_| ())
        .map_err(|e| format!("{name} is not a valid address: {e}"))
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.social.social_api_key.is_none() {
            return Err("SOCIAL_API_KEY is required in production mode".to_string());
        }

        check_url("RPC_URL", &self.chain.rpc_url)?;
        check_url("SOCIAL_API_URL", &self.social.social_api_url)?;

        if !self.social.social_replies_path.starts_with('/') {
            return Err("SOCIAL_REPLIES_PATH must start with '/'".to_string());
        }
        if self.social.social_page_size == 0 || self.social.social_max_pages == 0 {
            return Err("SOCIAL_PAGE_SIZE and SOCIAL_MAX_PAGES must be positive".to_string());
        }

        check_address("QUOTER_ADDRESS", &self.oracle.quoter_address)?;
        check_address("QUOTE_TOKEN", &self.oracle.quote_token)?;
        check_address("INTERMEDIATE_TOKEN", &self.oracle.intermediate_token)?;

        if self.oracle.fee_tiers.is_empty() {
            return Err("FEE_TIERS must list at least one tier".to_string());
        }
        if self.oracle.fee_tiers.len() > MAX_FEE_TIERS {
            return Err(format!(
                "FEE_TIERS lists {} tiers; at most {MAX_FEE_TIERS} are allowed",
                self.oracle.fee_tiers.len()
            ));
        }
        if let Some(fee) = self.oracle.fee_tiers.iter().find(|fee| **fee == 0 || **fee >= MAX_FEE) {
            return Err(format!("FEE_TIERS contains an invalid tier: {fee}"));
        }

        let longest_listing_ms =
            u64::from(self.social.social_max_pages).saturating_mul(self.social.social_timeout_ms);
        if self.verifying_lease_secs.saturating_mul(1000) <= longest_listing_ms {
            return Err(format!(
                "VERIFYING_LEASE_SECS must exceed the longest reaction listing ({longest_listing_ms} ms)"
            ));
        }

        if self.content_host.trim().is_empty() || self.content_host.contains('/') {
            return Err("CONTENT_HOST must be a bare host name".to_string());
        }

        Ok(())
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            url: self.chain.rpc_url.clone(),
            timeout: Duration::from_millis(self.chain.rpc_timeout_ms),
            retries: self.chain.rpc_retries,
            backoff: Duration::from_millis(self.chain.rpc_backoff_ms),
        }
    }

    pub fn social_config(&self) -> SocialApiConfig {
        SocialApiConfig {
            base_url: self.social.social_api_url.trim_end_matches('/').to_string(),
            api_key: self.social.social_api_key.clone(),
            request_timeout: Duration::from_millis(self.social.social_timeout_ms),
            page_size: self.social.social_page_size,
            max_pages: self.social.social_max_pages,
            replies_path: self.social.social_replies_path.clone(),
        }
    }

    pub fn oracle_config(&self) -> Result<OracleConfig, AddressError> {
        Ok(OracleConfig {
            quoter: Address::parse(&self.oracle.quoter_address)?,
            quote_token: Address::parse(&self.oracle.quote_token)?,
            intermediate_token: Address::parse(&self.oracle.intermediate_token)?,
            fee_tiers: self.oracle.fee_tiers.clone(),
            cache_ttl: Duration::from_secs(self.oracle.tradable_cache_ttl_secs),
            max_cache_entries: self.oracle.tradable_cache_max_entries,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            verifying_lease: Duration::from_secs(self.verifying_lease_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["engage", "--social-api-key", "test-key"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = parse(&[]);
        assert!(args.validate().is_ok());

        let oracle = args.oracle_config().unwrap();
        assert_eq!(oracle.fee_tiers, vec![3000, 10000, 500]);
        assert_eq!(oracle.cache_ttl, Duration::from_secs(600));
        assert_eq!(oracle.quoter.to_string(), DEFAULT_QUOTER);

        let rpc = args.rpc_config();
        assert_eq!(rpc.timeout, Duration::from_secs(12));
        assert_eq!(rpc.retries, 1);
    }

    #[test]
    fn test_fee_tiers_from_list() {
        let args = parse(&["--fee-tiers", "10000,3000"]);
        assert_eq!(args.oracle.fee_tiers, vec![10000, 3000]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = parse(&["--quote-token", "0x1234"]);
        assert!(args.validate().unwrap_err().contains("QUOTE_TOKEN"));

        let args = parse(&["--fee-tiers", "0"]);
        assert!(args.validate().is_err());

        let args = parse(&["--fee-tiers", "3000,10000,500,100"]);
        assert!(args.validate().unwrap_err().contains("at most 3"));

        let args = parse(&["--rpc-url", "ws://localhost:8545"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_lease_must_outlast_reaction_listing() {
        let args = parse(&[]);
        assert_eq!(args.store_config().verifying_lease, Duration::from_secs(300));

        // 20 pages x 10 s per request
        let args = parse(&["--verifying-lease-secs", "200"]);
        assert!(args.validate().unwrap_err().contains("VERIFYING_LEASE_SECS"));

        let args = parse(&["--verifying-lease-secs", "200", "--social-max-pages", "5"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_social_config_trims_trailing_slash() {
        let args = parse(&["--social-api-url", "https://api.example.com/"]);
        assert_eq!(args.social_config().base_url, "https://api.example.com");
    }
}
