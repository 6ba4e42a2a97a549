//! Common utilities for all binaries
//!
//! Shared CLI parsing, configuration loading and logging setup.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ticker_core::core::TickerState;
use ticker_core::utils::init_logger;
use ticker_core::EngineConfig;

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// JSON configuration file (defaults plus TICKER_* overrides when absent)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,

    /// Stop after this many seconds (runs until ctrl-c when absent)
    #[arg(short, long)]
    pub duration_secs: Option<u64>,

    /// Seed for the random-walk price model
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Restore the persisted snapshot before starting
    #[arg(long)]
    pub restore: bool,
}

impl CommonArgs {
    /// Resolve the engine configuration: file or environment, then CLI flags
    pub fn load_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::from_env()?,
        };

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
        if self.seed.is_some() {
            config.price_seed = self.seed;
        }

        config.validate().context("Invalid command-line overrides")?;
        Ok(config)
    }
}

/// Initialize tracing/logging
pub fn init_logging(config: &EngineConfig) -> Result<()> {
    init_logger(&config.logging).context("Failed to install tracing subscriber")
}

/// Log one line per instrument
pub fn log_snapshot(state: &TickerState) {
    for stock in &state.stocks {
        let selected = state.selected_stock.as_deref() == Some(stock.symbol.as_str());
        tracing::info!(
            symbol = %stock.symbol,
            price = format!("{:.2}", stock.current_price),
            change_pct = format!("{:+.2}", stock.percentage_change),
            selected,
            "Quote"
        );
    }
}

/// Print final statistics
pub fn print_stats(state: &TickerState, uptime: &str) {
    tracing::info!("=== Final State ===");
    tracing::info!("Uptime: {}", uptime);
    tracing::info!("Instruments: {}", state.stocks.len());
    tracing::info!("Paused: {}", state.is_paused);
    tracing::info!("Update interval: {}ms", state.update_interval_ms);

    if let Some(stats) = state.memory_stats {
        tracing::info!("Last heap sample: {:.1} MB", stats.used_mb());
    }
    if let Some(error) = &state.error {
        tracing::warn!("Outstanding error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_apply() {
        let args = CommonArgs::parse_from([
            "ticker-sim",
            "--log-level",
            "debug",
            "--json-logs",
            "--seed",
            "7",
        ]);
        let config = args.load_config().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.price_seed, Some(7));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let args = CommonArgs::parse_from(["ticker-sim", "--log-level", "loud"]);
        assert!(args.load_config().is_err());
    }
}
