//! Configuration - Type-safe, validated config

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{Error, Result, Symbol};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,

    /// Engine pipeline settings
    pub engine: EngineConfig,

    /// Risk management
    pub risk: RiskConfig,

    /// Registered strategies, in dispatch order
    pub strategies: Vec<StrategyConfig>,

    /// Backtest replay settings
    pub backtest: BacktestConfig,

    /// Market data feed
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Run mode: live or backtest
    pub mode: RunMode,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Backtest,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Backtest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Strategies run one after another on the calling thread
    #[default]
    Sequential,
    /// Strategies run on scoped threads, one per strategy
    Parallel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dispatch: DispatchMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Max net position per symbol. Symbols missing here are rejected.
    pub limits: BTreeMap<String, Decimal>,
}

/// Strategy selection, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    SimpleMovingAverage {
        #[serde(default = "default_threshold")]
        threshold: Decimal,
        #[serde(default = "default_quantity")]
        quantity: Decimal,
    },
}

fn default_threshold() -> Decimal {
    Decimal::from(150)
}

fn default_quantity() -> Decimal {
    Decimal::from(100)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::SimpleMovingAverage {
            threshold: default_threshold(),
            quantity: default_quantity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Simulate an immediate fill for every accepted order
    pub auto_execute: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self { auto_execute: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Topic name on the publish/subscribe boundary
    pub topic: String,

    /// Per-subscriber buffer
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            topic: "market-data".to_string(),
            capacity: 1024,
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        Self::from_toml(&content)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    /// Does not log: callers report the source once logging is up.
    pub fn load_or_default(path: &Path) -> Result<(Self, ConfigSource)> {
        if path.exists() {
            Ok((Self::load(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (symbol, limit) in &self.risk.limits {
            if *limit < Decimal::ZERO {
                return Err(Error::Config(format!("negative exposure limit for {}: {}", symbol, limit)));
            }
        }
        for strategy in &self.strategies {
            match strategy {
                StrategyConfig::SimpleMovingAverage { quantity, .. } if *quantity <= Decimal::ZERO => {
                    return Err(Error::Config(format!("strategy quantity must be positive, got {}", quantity)));
                }
                StrategyConfig::SimpleMovingAverage { .. } => {}
            }
        }
        if self.feed.capacity == 0 {
            return Err(Error::Config("feed capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Exposure limits keyed by normalised symbol
    pub fn exposure_limits(&self) -> impl Iterator<Item = (Symbol, Decimal)> + '_ {
        self.risk.limits.iter().map(|(s, l)| (Symbol::new(s.as_str()), *l))
    }
}
