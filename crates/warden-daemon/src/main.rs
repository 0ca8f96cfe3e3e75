//! Warden daemon - tenant worker fleet controller
//!
//! Keeps one supervised worker process per active tenant, converged with
//! the desired state, and writes rolling health reports about the fleet.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};

/// Warden daemon CLI
#[derive(Parser)]
#[command(name = "wardend")]
#[command(about = "Warden - tenant worker fleet controller", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "WARDEN_LOG_JSON")]
    json: bool,

    /// Run one reconciliation and one health cycle, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        state_file = %config.reconcile.state_file.display(),
        reconcile_interval_secs = config.reconcile.interval_secs,
        health_interval_secs = config.health.interval_secs,
        "Starting warden daemon"
    );

    let server = Server::new(config).await?;
    if cli.once {
        server.run_once().await
    } else {
        server.run().await
    }
}
