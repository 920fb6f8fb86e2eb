use std::time::Duration;

use serde::Deserialize;

use crate::error::ChainSyncError;

pub const CONFIG_PREFIX: &str = "CHAINSYNC_";

/// Runtime settings for a console session. Every field has a local-devnet
/// default, so an empty environment yields a working configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Tried in order until one answers.
    pub rpc_urls: Vec<String>,
    pub metadata_api_base: String,
    /// Trailing blocks scanned when building transaction history.
    pub scan_window: u64,
    /// Trailing blocks shown in the timeline.
    pub display_window: u64,
    pub tick_interval_ms: u64,
    pub mempool_poll_interval_ms: u64,
    pub block_poll_interval_ms: u64,
    pub subscribe_retry_ms: u64,
    pub reconcile_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub event_lookback_blocks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec!["http://127.0.0.1:8545".to_string()],
            metadata_api_base: "http://127.0.0.1:8000".to_string(),
            scan_window: 10,
            display_window: 8,
            tick_interval_ms: 1000,
            mempool_poll_interval_ms: 2000,
            block_poll_interval_ms: 1000,
            subscribe_retry_ms: 2000,
            reconcile_interval_ms: 5000,
            request_timeout_ms: 10_000,
            event_lookback_blocks: 200,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ChainSyncError> {
        envy::prefixed(CONFIG_PREFIX)
            .from_env::<Self>()
            .map_err(|e| ChainSyncError::Config(format!("{e}")))
            .and_then(Self::validated)
    }

    /// Same as [`EngineConfig::from_env`] but reads the given variables
    /// instead of the process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, ChainSyncError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(CONFIG_PREFIX)
            .from_iter::<_, Self>(vars)
            .map_err(|e| ChainSyncError::Config(format!("{e}")))
            .and_then(Self::validated)
    }

    /// Rejects settings the engine cannot run with. Zero intervals would make
    /// the timers panic inside their tasks.
    pub(crate) fn validated(self) -> Result<Self, ChainSyncError> {
        if self.rpc_urls.is_empty() {
            return Err(ChainSyncError::Config(
                "at least one RPC url is required".to_string(),
            ));
        }
        if self.scan_window == 0 || self.display_window == 0 {
            return Err(ChainSyncError::Config(
                "block windows must be at least one block".to_string(),
            ));
        }
        let intervals = [
            self.tick_interval_ms,
            self.mempool_poll_interval_ms,
            self.block_poll_interval_ms,
            self.subscribe_retry_ms,
            self.reconcile_interval_ms,
        ];
        if intervals.contains(&0) {
            return Err(ChainSyncError::Config(
                "polling intervals must be non-zero".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn mempool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_poll_interval_ms)
    }

    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }

    pub fn subscribe_retry(&self) -> Duration {
        Duration::from_millis(self.subscribe_retry_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
