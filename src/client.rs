//! One capture run: connect, open the output file, receive, clean up.
//!
//! Ordering is fixed. The connection is opened first, then the output file;
//! if the file cannot be opened the connection is closed and no receive is
//! attempted. Once both are open the receive loop runs, and whatever way it
//! ends, the final statistics are emitted and both resources are closed
//! before [`StreamClient::run`] returns.

use crate::config::Config;
use crate::connection::{Connection, ConnectionManager};
use crate::error::{Error, Result};
use crate::receiver::StreamReceiver;
use crate::sink::OutputSink;
use crate::types::{CaptureSummary, Event, Termination};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capture client for a single instrument stream
pub struct StreamClient {
    config: Config,
    event_tx: broadcast::Sender<Event>,
}

impl StreamClient {
    /// Create a client for a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(1000);
        Ok(Self { config, event_tx })
    }

    /// Subscribe to capture events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Sender side of the event channel, for components that report into it
    pub fn event_sender(&self) -> broadcast::Sender<Event> {
        self.event_tx.clone()
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect to the instrument and capture until the stream ends or `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Connect`] / [`crate::Error::ConnectTimeout`]: nothing was opened
    /// - [`crate::Error::Cancelled`]: `cancel` fired before the connection was up
    /// - [`crate::Error::Open`]: the connection was opened and has been closed again
    /// - [`crate::Error::Write`]: the loop stopped on a write failure; final
    ///   statistics were emitted and everything was closed
    ///
    /// Once connected, a peer close, a shutdown request and a mid-stream
    /// transport error all return `Ok` with the matching [`Termination`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<CaptureSummary> {
        self.emit(Event::Connecting {
            host: self.config.host.clone(),
            port: self.config.port,
        });
        let manager = ConnectionManager::from_config(&self.config);
        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(addr = %manager.address(), "Shutdown requested while connecting");
                return Err(Error::Cancelled {
                    addr: manager.address(),
                });
            }
            result = manager.connect() => result?,
        };
        self.emit(Event::Connected {
            peer: conn.peer().to_string(),
        });

        self.capture(conn, cancel).await
    }

    /// Run the capture over an already-open connection.
    ///
    /// Takes ownership of `conn` and always closes it before returning.
    pub async fn capture<S>(
        &self,
        mut conn: Connection<S>,
        cancel: CancellationToken,
    ) -> Result<CaptureSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut sink = match OutputSink::open(&self.config.output_path).await {
            Ok(sink) => sink,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };
        self.emit(Event::SinkOpened {
            path: sink.path().to_path_buf(),
        });

        let mut receiver = StreamReceiver::new(
            self.config.chunk_size,
            self.config.poll_interval,
            self.config.report_interval,
            cancel,
            self.event_tx.clone(),
        );
        let outcome = receiver.run(&mut conn, &mut sink).await;

        let termination = match &outcome {
            Ok(termination) => termination.clone(),
            Err(e) => Termination::WriteFailed {
                message: e.to_string(),
            },
        };
        let stats = receiver.final_stats();
        tracing::info!(
            bytes = stats.total_bytes,
            lines = stats.line_count,
            dropped_bytes = stats.dropped_bytes,
            rate_kbps = stats.rate_kbps(),
            elapsed_secs = stats.elapsed_secs,
            termination = ?termination,
            "Capture finished"
        );
        self.emit(Event::Finished {
            stats: stats.clone(),
            termination: termination.clone(),
        });

        sink.close().await;
        conn.close().await;
        let output_path = sink.path().to_path_buf();
        tracing::info!(path = %output_path.display(), bytes_written = sink.bytes_written(), "Data saved");
        self.emit(Event::Saved {
            path: output_path.clone(),
        });

        outcome.map(|termination| CaptureSummary {
            stats,
            termination,
            output_path,
            chunks: receiver.chunks(),
        })
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config {
            output_path: dir.path().join("capture.csv"),
            poll_interval: Duration::from_millis(50),
            ..Config::for_host("mock")
        }
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = StreamClient::new(Config::default()).err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_capture_emits_lifecycle_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let client = StreamClient::new(config_in(&dir)).unwrap();
        let mut rx = client.subscribe();

        let mock = tokio_test::io::Builder::new().read(b"1,2\n3,4\n").build();
        let summary = client
            .capture(Connection::from_stream(mock, "mock"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::PeerClosed);
        assert_eq!(summary.stats.total_bytes, 8);
        assert_eq!(summary.stats.line_count, 2);
        assert_eq!(summary.chunks, 1);
        assert_eq!(std::fs::read(&summary.output_path).unwrap(), b"1,2\n3,4\n");

        let events = drain(&mut rx);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                Event::SinkOpened { .. } => "sink_opened",
                Event::PeerClosed => "peer_closed",
                Event::Finished { .. } => "finished",
                Event::Saved { .. } => "saved",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["sink_opened", "peer_closed", "finished", "saved"]);
    }

    #[tokio::test]
    async fn test_open_failure_closes_connection_without_receiving() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("missing").join("capture.csv"),
            ..config_in(&dir)
        };
        let client = StreamClient::new(config).unwrap();
        let mut rx = client.subscribe();

        // No receive loop runs, so nothing is emitted after the failed open
        let mock = tokio_test::io::Builder::new().build();
        let err = client
            .capture(Connection::from_stream(mock, "mock"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Open { .. }));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_receive_error_finishes_cleanly_with_final_stats() {
        let dir = tempfile::tempdir().unwrap();
        let client = StreamClient::new(config_in(&dir)).unwrap();
        let mut rx = client.subscribe();

        let mock = tokio_test::io::Builder::new()
            .read(b"1,2\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
            .build();
        let summary = client
            .capture(Connection::from_stream(mock, "mock"), CancellationToken::new())
            .await
            .unwrap();

        match &summary.termination {
            Termination::ReceiveError { message } => assert!(message.contains("reset by peer")),
            other => panic!("Expected ReceiveError termination, got {other:?}"),
        }
        assert_eq!(summary.stats.total_bytes, 4);
        assert_eq!(summary.stats.line_count, 1);
        assert_eq!(std::fs::read(&summary.output_path).unwrap(), b"1,2\n");

        let events = drain(&mut rx);
        let finished: Vec<&Event> = events
            .iter()
            .filter(|e| matches!(e, Event::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(
            finished[0],
            Event::Finished {
                termination: Termination::ReceiveError { .. },
                ..
            }
        ));
        assert!(events.iter().any(|e| matches!(e, Event::ReceiveFailed { .. })));
        assert!(matches!(events.last(), Some(Event::Saved { .. })));
    }

    #[tokio::test]
    async fn test_cancel_before_connect_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // TEST-NET-1 address, never answers
        let config = Config {
            host: "192.0.2.1".to_string(),
            connect_timeout: Some(Duration::from_secs(30)),
            ..config_in(&dir)
        };
        let output_path = config.output_path.clone();
        let client = StreamClient::new(config).unwrap();
        let mut rx = client.subscribe();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tokio::time::timeout(Duration::from_secs(5), client.run(cancel))
            .await
            .expect("run returns without waiting on the connect")
            .unwrap_err();

        match &err {
            Error::Cancelled { addr } => assert_eq!(addr, "192.0.2.1:8888"),
            other => panic!("Expected Cancelled error, got {other:?}"),
        }
        assert!(!err.is_fatal());
        assert!(!output_path.exists());

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [Event::Connecting { .. }]));
    }

    #[tokio::test]
    async fn test_write_failure_still_reports_final_stats() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: "/dev/full".into(),
            ..config_in(&dir)
        };
        let client = StreamClient::new(config).unwrap();
        let mut rx = client.subscribe();

        let mock = tokio_test::io::Builder::new().read(b"1,2\n").build();
        let err = client
            .capture(Connection::from_stream(mock, "mock"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Write { .. }));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Finished {
                termination: Termination::WriteFailed { .. },
                ..
            }
        )));
        assert!(matches!(events.last(), Some(Event::Saved { .. })));
    }
}
