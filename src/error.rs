//! Error types for agc-stream
//!
//! Every failure the capture client can report maps onto one variant of [`Error`]:
//! - connection failures (refused, unreachable, timed out)
//! - output file failures (cannot open, cannot write)
//! - configuration problems detected before anything is opened
//! - a shutdown request that arrives before the connection is up
//!
//! A transport failure mid-stream is not an error either: the receive loop
//! stops, and the run finishes with [`crate::Termination::ReceiveError`].
//! Undecodable bytes in the stream are dropped by
//! [`crate::decode::decode_permissive`] and only show up in the statistics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for agc-stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for agc-stream
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "host")
        key: Option<String>,
    },

    /// The transport connection could not be established
    #[error("could not connect to {addr}: {source}")]
    Connect {
        /// The `host:port` that was dialed
        addr: String,
        /// Underlying transport error
        #[source]
        source: std::io::Error,
    },

    /// The connect attempt did not finish within the configured timeout
    #[error("could not connect to {addr}: timed out after {timeout:?}")]
    ConnectTimeout {
        /// The `host:port` that was dialed
        addr: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The output file could not be opened for writing
    #[error("could not open output file {path}: {source}")]
    Open {
        /// Path that was requested
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The output file rejected a write or a sync
    #[error("could not write to output file {path}: {source}")]
    Write {
        /// Path of the output file
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// Shutdown was requested while the connection was still being established
    #[error("shutdown requested before connecting to {addr}")]
    Cancelled {
        /// The `host:port` that was being dialed
        addr: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error must end the process with a failure status.
    ///
    /// An operator shutdown before anything was opened is a clean exit.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Cancelled { .. })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_connect_error_display_includes_address_and_cause() {
        let err = Error::Connect {
            addr: "192.168.1.50:8888".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        };

        let msg = err.to_string();
        assert!(msg.contains("192.168.1.50:8888"));
        assert!(msg.contains("connection refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_open_error_keeps_path() {
        let err = Error::Open {
            path: PathBuf::from("/no/such/dir/out.csv"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };

        assert!(err.to_string().contains("/no/such/dir/out.csv"));
    }

    #[test]
    fn test_config_helper_sets_key() {
        match Error::config("host", "host must not be empty") {
            Error::Config { message, key } => {
                assert_eq!(message, "host must not be empty");
                assert_eq!(key.as_deref(), Some("host"));
            }
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_is_not_fatal() {
        let cancelled = Error::Cancelled {
            addr: "192.168.1.50:8888".to_string(),
        };
        let write = Error::Write {
            path: PathBuf::from("out.csv"),
            source: io::Error::other("disk full"),
        };

        assert!(!cancelled.is_fatal());
        assert!(cancelled.to_string().contains("192.168.1.50:8888"));
        assert!(write.is_fatal());
        assert!(Error::config("port", "port must be positive").is_fatal());
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
