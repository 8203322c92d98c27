//! CLI command implementations

pub mod error;
pub mod exchanges;
pub mod symbols;
pub mod sync;

pub use error::CliError;
pub use exchanges::ExchangesCommand;
pub use symbols::SymbolsCommand;
pub use sync::SyncArgs;

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;

/// OHLCV sync CLI
#[derive(Parser, Debug)]
#[command(name = "ohlcv-sync")]
#[command(about = "Incrementally sync OHLCV candles from crypto exchanges into InfluxDB", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync candles for one or more sources up to now
    Sync(SyncArgs),

    /// List the tradable symbols of an exchange
    Symbols(SymbolsCommand),

    /// List supported exchanges
    Exchanges(ExchangesCommand),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
