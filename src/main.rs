//! Main entry point for the ohlcv-sync CLI

use anyhow::Context;
use clap::Parser;
use ohlcv_sync::cli::{Cli, Commands};
use ohlcv_sync::config::AppConfig;
use ohlcv_sync::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ohlcv_sync=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        ohlcv_sync::metrics::init_metrics(addr)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("failed to start metrics exporter")?;
    }

    match &cli.command {
        Commands::Sync(args) => {
            let config = AppConfig::from_env()?;
            let shutdown = ShutdownCoordinator::shared();
            shutdown::set_global_shutdown(shutdown.clone());
            shutdown::spawn_ctrl_c_listener(shutdown.clone());
            args.execute(&cli, &config, shutdown).await?;
        }
        Commands::Symbols(cmd) => {
            cmd.execute(cli.output_format).await?;
        }
        Commands::Exchanges(cmd) => cmd.execute(cli.output_format)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
