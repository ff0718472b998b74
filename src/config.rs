//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `CHARTWATCH_`:
//!
//! ```toml
//! tick_ms = 1000
//! settle_ms = 150
//! target_path = "svg[5]/rect[13]"
//! key_tokens = ["RSI", "MACD"]
//! ```
//!
//! ```bash
//! CHARTWATCH_SETTLE_MS=200 CHARTWATCH_KEY_TOKENS=RSI,MACD chartwatch --page page.json
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::extract::{DEFAULT_KEY_TOKENS, DEFAULT_TARGET_PATH, DEFAULT_VOCABULARY};

/// All tunables of the monitor and the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extraction tick while running.
    pub tick_ms: u64,
    /// Wait between a synthetic hover and reading the tooltip.
    pub settle_ms: u64,
    /// Re-hover when the last hover is older than this.
    pub hover_refresh_ms: u64,
    /// Health check period while running.
    pub health_ms: u64,
    /// A running monitor with no completed cycle for this long is reported as stalled.
    pub stall_ms: u64,
    pub cache_ttl_ms: u64,
    pub batch_window_ms: u64,
    /// Consecutive failed cycles that stop the monitor.
    pub max_consecutive_failures: u32,
    /// Distance from the target's right edge for the hover point, 1 to 2 px.
    pub hover_inset_px: f64,
    pub target_path: String,
    /// Keys accepted as-is (case-insensitive).
    pub vocabulary: Vec<String>,
    /// Keys containing one of these are accepted.
    pub key_tokens: Vec<String>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            settle_ms: 150,
            hover_refresh_ms: 10_000,
            health_ms: 5000,
            stall_ms: 3000,
            cache_ttl_ms: 3000,
            batch_window_ms: 500,
            max_consecutive_failures: 5,
            hover_inset_px: 1.0,
            target_path: DEFAULT_TARGET_PATH.to_string(),
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            key_tokens: DEFAULT_KEY_TOKENS.iter().map(|s| s.to_string()).collect(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(
                Environment::with_prefix("CHARTWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("vocabulary")
                    .with_list_parse_key("key_tokens"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn hover_refresh(&self) -> Duration {
        Duration::from_millis(self.hover_refresh_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_ms)
    }

    pub fn stall_after(&self) -> Duration {
        Duration::from_millis(self.stall_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}
