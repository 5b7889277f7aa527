// Configuration management for the market sync core

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upstream streaming and polling settings for the leader tab
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Start the live feed when this tab becomes leader
    pub enabled: bool,
    pub ws_url: String,
    /// Lowercase base+quote pairs, e.g. "btcusdt"
    pub symbols: Vec<String>,
    /// Same-origin proxy tried first; empty disables the proxy hop
    pub proxy_base_url: String,
    pub upstream_base_url: String,
    pub fear_greed_url: String,
    pub markets_per_page: usize,
    pub markets_interval_secs: u64,
    pub global_interval_secs: u64,
    pub fear_greed_interval_secs: u64,
    /// One budget shared by the proxy attempt and the upstream fallback
    pub rest_timeout_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: "wss://stream.binance.com:9443/stream".to_string(),
            symbols: [
                "btcusdt", "ethusdt", "bnbusdt", "solusdt", "xrpusdt", "adausdt",
                "dogeusdt", "avaxusdt", "dotusdt", "linkusdt", "maticusdt", "ltcusdt",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            proxy_base_url: String::new(),
            upstream_base_url: "https://api.coingecko.com/api/v3".to_string(),
            fear_greed_url: "https://api.alternative.me/fng/?limit=1".to_string(),
            markets_per_page: 100,
            markets_interval_secs: 30,
            global_interval_secs: 60,
            fear_greed_interval_secs: 300,
            rest_timeout_ms: 10_000,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            reconnect_max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// How long a tab waits for a live leader before claiming
    pub claim_delay_ms: u64,
    /// Capacity of the in-process broadcast ring shared by tabs
    pub bus_capacity: usize,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            claim_delay_ms: 300,
            bus_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub enabled: bool,
    /// A reply slower than this marks the worker unavailable
    pub reply_timeout_ms: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reply_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Rolling window kept per tracked symbol
    pub history_len: usize,
    /// Symbols whose recent prices survive a reload
    pub tracked_symbols: Vec<String>,
    pub cache_markets: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/market-sync.db".to_string(),
            history_len: 20,
            tracked_symbols: vec![
                "btcusdt".to_string(),
                "ethusdt".to_string(),
                "solusdt".to_string(),
            ],
            cache_markets: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enable_tick_logging: bool,
    pub enable_election_logging: bool,
    pub status_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_tick_logging: false,
            enable_election_logging: true,
            status_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub election: ElectionConfig,
    pub offload: OffloadConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.symbols.is_empty() {
            return Err(ConfigError::Validation("feed.symbols must not be empty".to_string()));
        }

        if let Some(bad) = self.feed.symbols.iter().find(|s| s.chars().any(|c| c.is_ascii_uppercase())) {
            return Err(ConfigError::Validation(format!(
                "feed.symbols must be lowercase (got '{}')",
                bad
            )));
        }

        if self.feed.markets_interval_secs == 0
            || self.feed.global_interval_secs == 0
            || self.feed.fear_greed_interval_secs == 0
        {
            return Err(ConfigError::Validation("poll intervals must be greater than 0".to_string()));
        }

        if self.feed.rest_timeout_ms == 0 {
            return Err(ConfigError::Validation("rest_timeout_ms must be greater than 0".to_string()));
        }

        if self.feed.reconnect_base_delay_ms > self.feed.reconnect_max_delay_ms {
            return Err(ConfigError::Validation(
                "reconnect_base_delay_ms must not exceed reconnect_max_delay_ms".to_string(),
            ));
        }

        if self.election.bus_capacity == 0 {
            return Err(ConfigError::Validation("bus_capacity must be greater than 0".to_string()));
        }

        if self.storage.history_len == 0 {
            return Err(ConfigError::Validation("history_len must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
