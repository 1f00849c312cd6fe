//! Application configuration.

use chainwatch_alerts::NotifierConfig;
use chainwatch_core::{Address, TokenThresholds};
use chainwatch_engine::{MonitorConfig, DEFAULT_WINDOWS_SECS};
use chainwatch_feeds::RpcConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid token entry {key}: {reason}")]
    InvalidToken { key: String, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Node connection.
    pub rpc: RpcConfig,
    /// Token address -> whale threshold in human units.
    pub tokens: BTreeMap<String, Decimal>,
    /// Detection settings.
    pub monitor: MonitorSettings,
    /// Alert channels.
    pub alerts: NotifierConfig,
    /// Logging level.
    pub log_level: Option<String>,
}

/// Detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub alert_cooldown_minutes: u64,
    pub windows_secs: Vec<u64>,
    pub heartbeat_every_blocks: u64,
    pub reconnect_delay_ms: u64,
    pub receipt_concurrency: usize,
    pub metadata_timeout_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            alert_cooldown_minutes: 60,
            windows_secs: DEFAULT_WINDOWS_SECS.to_vec(),
            heartbeat_every_blocks: 10,
            reconnect_delay_ms: 2_000,
            receipt_concurrency: 8,
            metadata_timeout_ms: 5_000,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse token keys into addresses. Keys are case-insensitive; thresholds
    /// must be positive.
    pub fn thresholds(&self) -> Result<TokenThresholds, ConfigError> {
        self.tokens
            .iter()
            .map(|(key, threshold)| {
                let address: Address = key.parse().map_err(|e| ConfigError::InvalidToken {
                    key: key.clone(),
                    reason: format!("{}", e),
                })?;
                if *threshold <= Decimal::ZERO {
                    return Err(ConfigError::InvalidToken {
                        key: key.clone(),
                        reason: format!("threshold must be positive, got {}", threshold),
                    });
                }
                Ok((address, *threshold))
            })
            .collect()
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let settings = &self.monitor;
        let windows_secs = if settings.windows_secs.is_empty() {
            DEFAULT_WINDOWS_SECS.to_vec()
        } else {
            settings.windows_secs.clone()
        };
        Ok(MonitorConfig {
            windows_secs,
            heartbeat_every_blocks: settings.heartbeat_every_blocks,
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            receipt_concurrency: settings.receipt_concurrency,
            metadata_timeout: Duration::from_millis(settings.metadata_timeout_ms),
            ..MonitorConfig::new(self.thresholds()?)
        }
        .with_cooldown_minutes(settings.alert_cooldown_minutes))
    }
}
