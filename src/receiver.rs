//! The receive loop: pull chunks, persist them, count them.
//!
//! Each iteration:
//! 1. stop if shutdown has been requested
//! 2. wait (bounded by the poll interval) for the next chunk
//! 3. an empty read means the peer is done; drain and stop
//! 4. decode permissively, append the text to the sink, then account for the chunk
//!
//! Chunks are handled strictly in arrival order by a single task. A transport
//! error ends the loop without failing the run. A sink write error ends the
//! loop and is returned, since nothing received afterwards could be kept.

use crate::connection::{Connection, Received};
use crate::decode::decode_permissive;
use crate::error::Result;
use crate::sink::OutputSink;
use crate::stats::{StatsReporter, StatsSnapshot};
use crate::types::{Chunk, Event, Termination};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Where the receive loop is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverState {
    /// Created, loop not started
    Idle,
    /// Loop running
    Receiving,
    /// Peer closed the stream; no further I/O happens
    Draining,
    /// Loop has exited
    Terminating,
}

/// Drives the receive loop for one connection and one sink
#[derive(Debug)]
pub struct StreamReceiver {
    chunk_size: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
    stats: StatsReporter,
    events: broadcast::Sender<Event>,
    state: ReceiverState,
    chunks: u64,
}

impl StreamReceiver {
    /// Receiver that reads up to `chunk_size` bytes per call and re-checks
    /// `cancel` at least every `poll_interval`
    pub fn new(
        chunk_size: usize,
        poll_interval: Duration,
        report_interval: Duration,
        cancel: CancellationToken,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            chunk_size,
            poll_interval,
            cancel,
            stats: StatsReporter::start(report_interval),
            events,
            state: ReceiverState::Idle,
            chunks: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Chunks handled so far
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Counters so far
    pub fn stats(&self) -> &StatsReporter {
        &self.stats
    }

    /// Final statistics against total elapsed time
    pub fn final_stats(&self) -> StatsSnapshot {
        self.stats.finish()
    }

    /// Run until the peer closes, shutdown is requested, or an error occurs.
    ///
    /// Returns why the loop stopped. Only a sink write failure is returned as
    /// an error. Neither the connection nor the sink is closed here beyond
    /// what the connection does itself on end of stream or transport error.
    pub async fn run<S>(
        &mut self,
        conn: &mut Connection<S>,
        sink: &mut OutputSink,
    ) -> Result<Termination>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.state = ReceiverState::Receiving;
        tracing::debug!(
            peer = conn.peer(),
            chunk_size = self.chunk_size,
            poll_interval = ?self.poll_interval,
            "Receive loop started"
        );

        let outcome = loop {
            if self.cancel.is_cancelled() {
                tracing::info!(chunks = self.chunks, "Shutdown requested, leaving receive loop");
                break Ok(Termination::Cancelled);
            }

            match conn.recv_chunk(self.chunk_size, self.poll_interval).await {
                Ok(Received::Idle) => continue,
                Ok(Received::Closed) => {
                    self.state = ReceiverState::Draining;
                    self.emit(Event::PeerClosed);
                    break Ok(Termination::PeerClosed);
                }
                Ok(Received::Chunk(chunk)) => {
                    if let Err(e) = self.handle_chunk(&chunk, sink).await {
                        self.emit(Event::WriteFailed {
                            error: e.to_string(),
                        });
                        break Err(e);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(error = %e, chunks = self.chunks, "Receive loop stopped by transport error");
                    self.emit(Event::ReceiveFailed {
                        error: message.clone(),
                    });
                    break Ok(Termination::ReceiveError { message });
                }
            }
        };

        self.state = ReceiverState::Terminating;
        outcome
    }

    async fn handle_chunk(&mut self, chunk: &Chunk, sink: &mut OutputSink) -> Result<()> {
        let decoded = decode_permissive(&chunk.data);
        if decoded.dropped > 0 {
            tracing::debug!(
                seq = chunk.seq,
                dropped = decoded.dropped,
                "Dropped undecodable bytes"
            );
        }

        if !decoded.text.is_empty() {
            sink.append(decoded.text.as_bytes()).await?;
        }

        self.chunks += 1;
        if let Some(snapshot) = self
            .stats
            .record(chunk.len(), decoded.newlines(), decoded.dropped)
        {
            tracing::debug!(
                bytes = snapshot.total_bytes,
                lines = snapshot.line_count,
                rate_kbps = snapshot.rate_kbps(),
                elapsed_secs = snapshot.elapsed_secs,
                "Capture status"
            );
            self.emit(Event::Status { stats: snapshot });
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.events.send(event).ok();
    }
}
