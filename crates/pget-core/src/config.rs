use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::CurlOptions;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
///
/// Without this section a failed segment is not retried; the job ends as
/// partial and is resumed by running it again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per segment (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/pget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgetConfig {
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
    /// A transfer slower than `low_speed_limit_bytes` per second for this many
    /// seconds fails with a fetch error (per-read stall timeout).
    pub read_timeout_secs: u64,
    /// Throughput floor in bytes per second used with `read_timeout_secs`.
    pub low_speed_limit_bytes: u32,
    /// Persist the progress ledger every N recorded chunks (1 = every chunk).
    pub ledger_flush_every: u32,
    /// Fixed segment count (None = derived from the object size).
    #[serde(default)]
    pub segment_count: Option<usize>,
    /// Fixed streaming chunk size in bytes (None = derived).
    #[serde(default)]
    pub chunk_size_bytes: Option<u64>,
    /// Cap on segments fetched at once (None = one thread per segment).
    #[serde(default)]
    pub max_concurrent_segments: Option<usize>,
    /// Optional retry layer above the segment workers; disabled when missing.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for PgetConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            low_speed_limit_bytes: 1024,
            ledger_flush_every: 1,
            segment_count: None,
            chunk_size_bytes: None,
            max_concurrent_segments: None,
            retry: None,
        }
    }
}

impl PgetConfig {
    /// Curl settings derived from the timeout fields.
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            low_speed_limit: self.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(self.read_timeout_secs.max(1)),
        }
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry.as_ref().map(RetryPolicy::from)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PgetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PgetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PgetConfig = toml::from_str(&data)?;
    Ok(cfg)
}
