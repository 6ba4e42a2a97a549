pub mod constants;
pub mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::data::{validate_interval, validate_name, validate_price, validate_symbol};

/// Prefix for environment overrides (`TICKER_UPDATE_INTERVAL_MS`, ...)
pub const ENV_PREFIX: &str = "TICKER_";

impl EngineConfig {
    /// Load configuration from a JSON file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let mut cfg: EngineConfig =
            serde_json::from_str(&raw).context("Failed to deserialize configuration")?;

        cfg.apply_env_overrides()?;
        cfg.validate()?;

        Ok(cfg)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Override selected fields from `TICKER_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_var("UPDATE_INTERVAL_MS") {
            self.update_interval_ms = v
                .parse()
                .with_context(|| format!("Invalid {}UPDATE_INTERVAL_MS '{}'", ENV_PREFIX, v))?;
        }

        if let Some(v) = env_var("MAX_MEMORY_MB") {
            self.memory.max_usage_mb = v
                .parse()
                .with_context(|| format!("Invalid {}MAX_MEMORY_MB '{}'", ENV_PREFIX, v))?;
        }

        if let Some(v) = env_var("STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(v));
        }

        if let Some(v) = env_var("LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.update_interval_ms).context("Invalid update_interval_ms")?;

        if self.rate_limits.window_ms == 0 {
            anyhow::bail!("rate_limits.window_ms must be positive");
        }

        let ceilings = [
            ("set_price", self.rate_limits.set_price),
            ("update_speed", self.rate_limits.update_speed),
            ("add_stock", self.rate_limits.add_stock),
            ("remove_stock", self.rate_limits.remove_stock),
            ("select_stock", self.rate_limits.select_stock),
        ];
        for (name, ceiling) in ceilings {
            if ceiling == 0 {
                anyhow::bail!("rate_limits.{} must be positive", name);
            }
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be positive");
        }

        if self.memory.enabled {
            if self.memory.check_interval_ms == 0 {
                anyhow::bail!("memory.check_interval_ms must be positive");
            }
            if self.memory.max_usage_mb == 0 {
                anyhow::bail!("memory.max_usage_mb must be positive");
            }
        }

        if self.storage.name.trim().is_empty() {
            anyhow::bail!("storage.name cannot be empty");
        }

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                valid_log_levels
            );
        }

        let mut seen = HashSet::new();
        for stock in &self.stocks {
            validate_symbol(&stock.symbol)
                .with_context(|| format!("Invalid seed symbol '{}'", stock.symbol))?;
            validate_name(&stock.name)
                .with_context(|| format!("Invalid seed name for '{}'", stock.symbol))?;
            validate_price(stock.price)
                .with_context(|| format!("Invalid seed price for '{}'", stock.symbol))?;
            if !seen.insert(stock.symbol.as_str()) {
                anyhow::bail!("Duplicate seed symbol '{}'", stock.symbol);
            }
        }

        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}
