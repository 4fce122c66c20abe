//! # agc-stream
//!
//! Streaming capture client for the Alpha Gamma Counter instrument.
//!
//! The instrument serves newline-delimited CSV records over a plain TCP
//! stream. This crate connects to it, persists every received byte to a local
//! file as it arrives, and reports throughput while running. A SIGINT or
//! SIGTERM stops the capture without losing data that was already received.
//!
//! ## Quick Start
//!
//! ```no_run
//! use agc_stream::{Config, ShutdownCoordinator, StreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         output_path: "run1.csv".into(),
//!         ..Config::for_host("192.168.1.50")
//!     };
//!     let client = StreamClient::new(config)?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let shutdown = ShutdownCoordinator::install(Some(client.event_sender()));
//!     let summary = client.run(shutdown.token()).await?;
//!     println!("{} bytes saved to {}", summary.stats.total_bytes, summary.output_path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Capture run orchestration
pub mod client;
/// Configuration types
pub mod config;
/// Transport connection handling
pub mod connection;
/// Permissive chunk decoding
pub mod decode;
/// Error types
pub mod error;
/// The receive loop
pub mod receiver;
/// Signal-driven shutdown
pub mod shutdown;
/// Durable output file
pub mod sink;
/// Throughput counters and reports
pub mod stats;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::StreamClient;
pub use config::{Config, DEFAULT_PORT};
pub use connection::{Connection, ConnectionManager};
pub use error::{Error, Result};
pub use receiver::{ReceiverState, StreamReceiver};
pub use shutdown::ShutdownCoordinator;
pub use sink::OutputSink;
pub use stats::{StatsReporter, StatsSnapshot};
pub use types::{CaptureSummary, Chunk, ConnectionState, Event, Termination};
