//! Bridge configuration types.
//!
//! [`BridgeConfig`] holds every runtime setting of the bridge.  Values are
//! layered in this order, later layers winning:
//!
//! 1. [`BridgeConfig::default()`]
//! 2. An optional TOML file (`--config <PATH>`)
//! 3. Command-line flags and their `EVSTREAM_*` environment variables
//!
//! Layer 3 lives in the binary; this module owns layers 1 and 2.
//!
//! # File format
//!
//! Every key is optional.  Missing keys keep their default:
//!
//! ```toml
//! model = "claude-sonnet-4.5"
//! input_tokens = 0
//! chunk_size = 4096
//! channel_capacity = 128
//! ping_interval = 15   # seconds, 0 disables keepalive pings
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All runtime configuration for one bridge run.
///
/// # Example
///
/// ```rust
/// use evstream_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.model, "claude-sonnet-4.5");
/// assert_eq!(cfg.chunk_size, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Model name echoed in `message_start` and the aggregated message.
    pub model: String,

    /// Prompt token count reported in `message_start` and `message_delta`
    /// accounting.  The backend does not report it, so the caller supplies it.
    pub input_tokens: u32,

    /// Bytes requested per read from the backend stream.
    pub chunk_size: usize,

    /// Capacity of the bounded channel between the decoder worker and the
    /// encoder.  When full, the decoder stops reading.
    pub channel_capacity: usize,

    /// Idle time after which a `ping` event is written.  Zero disables pings.
    #[serde(deserialize_with = "duration_from_secs")]
    pub ping_interval: Duration,
}

impl Default for BridgeConfig {
    /// | Field            | Default               |
    /// |------------------|-----------------------|
    /// | model            | `"claude-sonnet-4.5"` |
    /// | input_tokens     | `0`                   |
    /// | chunk_size       | `4096`                |
    /// | channel_capacity | `128`                 |
    /// | ping_interval    | 15 seconds            |
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4.5".to_string(),
            input_tokens: 0,
            chunk_size: 4096,
            channel_capacity: 128,
            ping_interval: Duration::from_secs(15),
        }
    }
}

impl BridgeConfig {
    /// Parses a TOML document; absent keys take their default value.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// `Some(interval)` when keepalive pings are enabled.
    pub fn keepalive(&self) -> Option<Duration> {
        (!self.ping_interval.is_zero()).then_some(self.ping_interval)
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
