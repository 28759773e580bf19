//! SWEEPD Daemon Binary
//!
//! Safe-point scheduler and GC sweep coordinator for a distributed MVCC
//! key-value store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sweepd::{Config, ExecMode, GcScheduler, Lifecycle, OracleClient, StorageClient};
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound on connection cleanup after the loop exits.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// SWEEPD - GC sweep coordinator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Coordination-service endpoints, comma-separated
    #[arg(long, default_value = "127.0.0.1:2379")]
    pd: String,

    /// Use distributed GC; set to false for a concurrency-bounded local sweep
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    distributed: bool,

    /// Sweep worker budget, only used when distributed is false
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Minimum spacing between completed sweeps
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    run_interval: Duration,

    /// GC retention window; must be at least 10 minutes
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    life_time: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sweepd=info".parse()?))
        .init();

    let args = Args::parse();

    let mode = if args.distributed {
        ExecMode::Distributed
    } else {
        ExecMode::Local {
            concurrency: args.concurrency,
        }
    };

    let config = Config::default()
        .with_endpoints(&args.pd)
        .with_mode(mode)
        .with_run_interval(args.run_interval)
        .with_life_time(args.life_time);
    config.validate()?;

    info!("GC coordinator started");
    info!("Endpoints: {:?}", config.endpoints);
    info!("Mode: {:?}", config.mode);
    info!("Run interval: {:?}", config.run_interval);
    info!("GC life time: {:?}", config.life_time);

    let oracle = Arc::new(
        OracleClient::connect(&config.endpoints)
            .await
            .context("failed to open oracle client")?,
    );
    let storage = Arc::new(
        StorageClient::connect(&config.endpoints)
            .await
            .context("failed to open storage handle")?,
    );

    let lifecycle = Lifecycle::new();
    lifecycle.spawn_signal_handler();

    let scheduler = GcScheduler::new(Arc::clone(&oracle), Arc::clone(&storage), &config);
    scheduler.run(lifecycle.token()).await;

    // A leaked connection after intended exit is unacceptable, so close
    // failures are fatal; cleanup itself is bounded.
    timeout(SHUTDOWN_TIMEOUT, async {
        oracle.close().await?;
        storage.close().await
    })
    .await
    .context("timed out closing cluster connections")?
    .context("failed to close cluster connections")?;

    info!("Shutdown complete");
    Ok(())
}
