//! Labelgate - task-serving gateway for crowdsourced micro-task labeling

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labelgate::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("labelgate={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Labelgate - micro-task gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Rate limits: tasks={} batch={} sessions={} default={}",
        args.rate.tasks, args.rate.tasks_batch, args.rate.users_sessions, args.rate.rate_default);
    info!("Platform complexity ceiling: {}", args.platform_max_complexity);
    info!(
        "TTLs: assignment={}s lease={}s session={}s audit={}s",
        args.assignment_ttl_seconds,
        args.lease_ttl_seconds,
        args.session_ttl_seconds,
        args.audit_ttl_seconds
    );
    info!("======================================");

    let state = Arc::new(AppState::new(args)?);
    server::run(state).await?;

    Ok(())
}
