//! Monitor configuration.

use chainwatch_core::TokenThresholds;
use std::time::Duration;

/// Default rolling windows, in seconds.
pub const DEFAULT_WINDOWS_SECS: [u64; 2] = [60, 300];

/// Configuration for the hot-wallet monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Monitored tokens and their thresholds (human units).
    pub tokens: TokenThresholds,
    /// Minimum time between two alerts for the same contract.
    pub alert_cooldown: Duration,
    /// Rolling window lengths (seconds).
    pub windows_secs: Vec<u64>,
    /// Log a heartbeat every N processed blocks.
    pub heartbeat_every_blocks: u64,
    /// Pause before reconnecting after the stream drops.
    pub reconnect_delay: Duration,
    /// How long a contract-code lookup is trusted.
    pub code_cache_ttl: Duration,
    /// How long token decimals/symbol are trusted.
    pub metadata_ttl: Duration,
    /// Timeout for each metadata `eth_call`.
    pub metadata_timeout: Duration,
    /// Transactions prepared concurrently per block.
    pub receipt_concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tokens: TokenThresholds::default(),
            alert_cooldown: Duration::from_secs(60 * 60),
            windows_secs: DEFAULT_WINDOWS_SECS.to_vec(),
            heartbeat_every_blocks: 10,
            reconnect_delay: Duration::from_secs(2),
            code_cache_ttl: Duration::from_secs(6 * 60 * 60),
            metadata_ttl: Duration::from_secs(24 * 60 * 60),
            metadata_timeout: Duration::from_secs(5),
            receipt_concurrency: 8,
        }
    }
}

impl MonitorConfig {
    /// Defaults with the given token set.
    pub fn new(tokens: TokenThresholds) -> Self {
        Self {
            tokens,
            ..Default::default()
        }
    }

    /// Set the alert cooldown in minutes.
    pub fn with_cooldown_minutes(mut self, minutes: u64) -> Self {
        self.alert_cooldown = Duration::from_secs(minutes.saturating_mul(60));
        self
    }
}
