//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field has a default, so an empty file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::arbitrage::ArbitrageConfig;
use crate::backtest::runner::BacktestConfig;
use crate::model::LogisticModel;
use crate::strategy::risk::AlertPolicy;
use crate::strategy::EngineConfig;
use crate::types::EngineError;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub arbitrage: ArbitrageConfig,
    pub backtest: BacktestConfig,
    pub alerts: AlertPolicy,
    /// Optional logistic model behind the model edge.
    pub model: Option<LogisticModel>,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.engine.validate()?;
        self.arbitrage.validate()?;
        self.backtest.validate()?;
        for strategy in &self.backtest.strategies {
            if !(strategy.max_stake_pct > 0.0 && strategy.max_odds > 1.0) {
                return Err(EngineError::Config(format!(
                    "strategy '{}' needs max_stake_pct > 0 and max_odds > 1.0",
                    strategy.name
                )));
            }
        }
        Ok(())
    }
}
