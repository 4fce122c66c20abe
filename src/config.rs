//! Configuration types for agc-stream

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the instrument streams on unless told otherwise
pub const DEFAULT_PORT: u16 = 8888;

/// Largest number of bytes taken from the transport per receive call
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Upper bound on `chunk_size`; the receive buffer is allocated at this size
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Capture client configuration
///
/// Every field has a default except `host`, which must be supplied before
/// [`Config::validate`] passes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Instrument address (IP or hostname)
    #[serde(default)]
    pub host: String,

    /// Instrument TCP port (default: 8888)
    #[serde(default = "default_port")]
    pub port: u16,

    /// File the stream is persisted to (default: timestamped name in the working directory)
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Maximum bytes per receive call (default: 4096)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Upper bound on the connect attempt (None = OS default)
    #[serde(default, with = "optional_duration_secs")]
    pub connect_timeout: Option<Duration>,

    /// Longest a single receive waits before the loop re-checks for shutdown (default: 250ms)
    #[serde(default = "default_poll_interval", with = "duration_millis")]
    pub poll_interval: Duration,

    /// Minimum spacing between periodic status reports (default: 1s)
    #[serde(default = "default_report_interval", with = "duration_millis")]
    pub report_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            output_path: default_output_path(),
            chunk_size: default_chunk_size(),
            connect_timeout: None,
            poll_interval: default_poll_interval(),
            report_interval: default_report_interval(),
        }
    }
}

impl Config {
    /// Configuration for `host` with every other setting at its default
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Check the configuration before anything is opened
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host", "host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port", "port must be a positive integer"));
        }
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size", "chunk size must be at least 1 byte"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::config(
                "chunk_size",
                format!("chunk size must not exceed {MAX_CHUNK_SIZE} bytes"),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval", "poll interval must be non-zero"));
        }
        if self.report_interval.is_zero() {
            return Err(Error::config(
                "report_interval",
                "report interval must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Parse a connect timeout given in seconds
///
/// Rejects zero, negative, non-finite and out-of-range values.
pub fn connect_timeout_from_secs(secs: f64) -> Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(Error::config(
            "connect_timeout",
            format!("connect timeout must be a positive number of seconds, got {secs}"),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        Error::config(
            "connect_timeout",
            format!("connect timeout of {secs} seconds is out of range: {e}"),
        )
    })
}

/// Timestamped output file name, e.g. `unified_timestamps_20250617_142501.csv`
pub fn default_output_path() -> PathBuf {
    output_path_for(chrono::Local::now().naive_local())
}

fn output_path_for(now: chrono::NaiveDateTime) -> PathBuf {
    PathBuf::from(format!(
        "unified_timestamps_{}.csv",
        now.format("%Y%m%d_%H%M%S")
    ))
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_report_interval() -> Duration {
    Duration::from_secs(1)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(super::connect_timeout_from_secs)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
