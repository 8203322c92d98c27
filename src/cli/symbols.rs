//! Symbol discovery: list the tradable symbols of an exchange

use clap::Args;
use tracing::info;

use super::{CliError, OutputFormat};
use crate::fetcher::{Exchange, FetcherResult};
use crate::registry::ExchangeSet;

/// Symbols subcommand
#[derive(Debug, Args)]
pub struct SymbolsCommand {
    /// Exchange name from the registry (e.g. bitmex)
    pub exchange: String,
}

impl SymbolsCommand {
    /// Execute the symbols command
    pub async fn execute(&self, format: OutputFormat) -> Result<Vec<String>, CliError> {
        let exchanges = ExchangeSet::from_registry([self.exchange.as_str()])?;
        let exchange = exchanges.get(&self.exchange.trim().to_lowercase())?;
        let symbols = list_symbols(exchange.as_ref()).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "exchange": exchange.name(),
                    "symbols": symbols,
                });
                let rendered = serde_json::to_string_pretty(&output).map_err(|e| {
                    CliError::OutputError(format!("Failed to serialize results to JSON: {e}"))
                })?;
                println!("{rendered}");
            }
            OutputFormat::Human => {
                println!("Found {} symbols on {}:\n", symbols.len(), exchange.name());
                for symbol in &symbols {
                    println!("{symbol}");
                }
            }
        }

        Ok(symbols)
    }
}

/// Load the exchange's instrument list as sorted, unique `BASE/QUOTE` symbols
pub async fn list_symbols(exchange: &dyn Exchange) -> FetcherResult<Vec<String>> {
    let mut symbols = exchange.list_symbols().await?;
    symbols.sort();
    symbols.dedup();
    info!(exchange = %exchange.name(), symbols = symbols.len(), "Loaded markets");
    Ok(symbols)
}
