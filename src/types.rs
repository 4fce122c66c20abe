//! Core types shared across the capture pipeline.

use crate::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One unit of bytes returned by a single receive call
///
/// Chunks are numbered in arrival order starting at 1 and are not retained
/// once they have been decoded, written and counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in the stream (1-based)
    pub seq: u64,
    /// Raw bytes exactly as read from the transport
    pub data: Vec<u8>,
}

impl Chunk {
    /// Raw length of the chunk before decoding
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lifecycle of a transport connection
///
/// A [`crate::connection::Connection`] only exists after a successful
/// connect. It moves from `Connected` to `Closed` exactly once and is never
/// reopened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Transport is open and readable
    Connected,
    /// Transport has been released
    Closed,
}

/// Why the receive loop stopped
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The peer closed the stream (empty read)
    PeerClosed,
    /// The operator requested shutdown
    Cancelled,
    /// The transport failed mid-stream; recovered locally
    ReceiveError {
        /// Description of the transport error
        message: String,
    },
    /// The output file rejected a write; fatal for the run
    WriteFailed {
        /// Description of the write error
        message: String,
    },
}

impl Termination {
    /// Whether the run ended without a fatal condition
    pub fn is_clean(&self) -> bool {
        !matches!(self, Termination::WriteFailed { .. })
    }
}

/// Result of a completed capture run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Final statistics computed against total elapsed time
    pub stats: StatsSnapshot,
    /// Why the receive loop stopped
    pub termination: Termination,
    /// Where the captured data was persisted
    pub output_path: PathBuf,
    /// Number of chunks received from the transport
    pub chunks: u64,
}

/// Event emitted during a capture run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A connect attempt is starting
    Connecting {
        /// Host being dialed
        host: String,
        /// Port being dialed
        port: u16,
    },

    /// The transport connection is open
    Connected {
        /// Resolved peer address
        peer: String,
    },

    /// The output file is open and the receive loop is about to start
    SinkOpened {
        /// Output file path
        path: PathBuf,
    },

    /// Periodic throughput report (roughly once per report interval)
    Status {
        /// Cumulative statistics at the time of the report
        stats: StatsSnapshot,
    },

    /// The peer closed the stream
    PeerClosed,

    /// A termination signal was received
    ShutdownRequested {
        /// Name of the signal (e.g. "SIGINT")
        signal: String,
    },

    /// The transport failed mid-stream
    ReceiveFailed {
        /// Error message
        error: String,
    },

    /// The output file rejected a write
    WriteFailed {
        /// Error message
        error: String,
    },

    /// The receive loop has exited; final statistics
    Finished {
        /// Final statistics computed against total elapsed time
        stats: StatsSnapshot,
        /// Why the loop stopped
        termination: Termination,
    },

    /// Cleanup is complete and the data file is closed
    Saved {
        /// Output file path
        path: PathBuf,
    },
}
