//! Engage - engagement verification service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engage::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("engage={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Engage - engagement verification");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("RPC: {}", args.chain.rpc_url);
    info!("Social API: {}", args.social.social_api_url);
    info!("Quoter: {}", args.oracle.quoter_address);
    info!("Fee tiers: {:?}", args.oracle.fee_tiers);
    info!("Content host: {}", args.content_host);
    info!("======================================");

    let state = Arc::new(AppState::from_args(args)?);
    server::run(state).await?;

    Ok(())
}
