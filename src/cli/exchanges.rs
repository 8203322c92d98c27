//! Exchanges command: list the registry

use clap::Args;
use serde_json::json;

use super::{CliError, OutputFormat};
use crate::registry::ExchangeRegistry;

/// Exchanges subcommand
#[derive(Debug, Args)]
pub struct ExchangesCommand {}

impl ExchangesCommand {
    /// Execute the exchanges command
    pub fn execute(&self, format: OutputFormat) -> Result<(), CliError> {
        let registry = ExchangeRegistry::load()?;

        match format {
            OutputFormat::Json => {
                let entries: Vec<_> = registry
                    .entries()
                    .map(|e| {
                        json!({
                            "name": e.name(),
                            "kind": e.kind(),
                            "description": e.description(),
                            "base_url": e.base_url(),
                            "rate_limit_ms": e.rate_limit().as_millis() as u64,
                            "max_page_size": e.max_page_size(),
                            "timeframes": e.timeframes(),
                        })
                    })
                    .collect();
                let rendered = serde_json::to_string_pretty(&entries).map_err(|e| {
                    CliError::OutputError(format!("Failed to serialize results to JSON: {e}"))
                })?;
                println!("{rendered}");
            }
            OutputFormat::Human => {
                for e in registry.entries() {
                    let timeframes: Vec<&str> = e.timeframes().iter().map(|t| t.as_str()).collect();
                    println!(
                        "{:<10} | {} | every {}ms | {}",
                        e.name(),
                        e.description(),
                        e.rate_limit().as_millis(),
                        timeframes.join(",")
                    );
                }
            }
        }

        Ok(())
    }
}
