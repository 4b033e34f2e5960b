//! Engine Configuration

use std::{fs, path::Path};

use clap::{Args, ValueEnum};
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// Where the evaluation currency comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PreferredCurrencySource {
    /// The request's explicit currency, falling back to the agent's
    ExplicitOverride,

    /// Always the agent's currency
    #[default]
    AgentDefault,
}

impl PreferredCurrencySource {
    /// Pick the evaluation currency.
    pub fn select(
        self,
        agent: &'static Currency,
        explicit: Option<&'static Currency>,
    ) -> &'static Currency {
        match self {
            PreferredCurrencySource::ExplicitOverride => explicit.unwrap_or(agent),
            PreferredCurrencySource::AgentDefault => agent,
        }
    }
}

/// Maximum penalty engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Args)]
#[serde(default)]
pub struct EngineConfig {
    /// Failed fares that abort a pricing transaction; 0 never aborts
    #[arg(long, env = "MAX_PENALTY_FAILED_FARES_THRESHOLD", default_value_t = 0)]
    pub failed_fares_threshold: u32,

    /// Source of the evaluation currency
    #[arg(
        long,
        env = "MAX_PENALTY_CURRENCY_SOURCE",
        value_enum,
        default_value_t = PreferredCurrencySource::AgentDefault
    )]
    pub preferred_currency_source: PreferredCurrencySource,
}

impl EngineConfig {
    /// Parse configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the document is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }
}
