//! Transport connection to the instrument.
//!
//! [`ConnectionManager`] makes exactly one connect attempt per call. There is
//! no retry and no backoff: a failed attempt is reported with its cause and
//! the caller decides what to do.
//!
//! A [`Connection`] owns the transport until it is closed. It closes itself
//! when the peer ends the stream or the transport fails, and [`Connection::close`]
//! is safe to call again afterwards.

use crate::config::{Config, DEFAULT_PORT};
use crate::error::{Error, Result};
use crate::types::{Chunk, ConnectionState};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Outcome of one bounded receive call
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// Bytes arrived
    Chunk(Chunk),
    /// The peer closed the stream (empty read)
    Closed,
    /// Nothing arrived within the wait bound
    Idle,
}

/// Opens TCP connections to the instrument
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    host: String,
    port: u16,
    timeout: Option<Duration>,
}

impl ConnectionManager {
    /// Manager for `host:port` with no connect timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    /// Manager for the instrument's default port
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    /// Manager built from a validated [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.host.clone(), config.port).timeout(config.connect_timeout)
    }

    /// Bound the connect attempt
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` this manager dials
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Make a single connection attempt.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the host is empty or the port is zero
    /// - [`Error::Connect`] with the transport error if the attempt fails
    /// - [`Error::ConnectTimeout`] if the attempt outlives the timeout
    pub async fn connect(&self) -> Result<Connection<TcpStream>> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host", "host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port", "port must be a positive integer"));
        }

        let addr = self.address();
        tracing::info!(addr = %addr, timeout = ?self.timeout, "Connecting to instrument");

        let attempt = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(addr = %addr, ?timeout, "Connect attempt timed out");
                    return Err(Error::ConnectTimeout { addr, timeout });
                }
            },
            None => attempt.await,
        }
        .map_err(|source| {
            tracing::error!(addr = %addr, error = %source, "Could not connect to instrument");
            Error::Connect {
                addr: addr.clone(),
                source,
            }
        })?;

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.clone());
        tracing::info!(peer = %peer, "Connected to instrument");

        Ok(Connection::from_stream(stream, peer))
    }
}

/// An open transport endpoint
///
/// Generic over the stream so the receive loop can run against in-memory
/// transports as well as TCP.
#[derive(Debug)]
pub struct Connection<S> {
    stream: Option<S>,
    peer: String,
    read_buf: Vec<u8>,
    next_seq: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream
    pub fn from_stream(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            peer: peer.into(),
            read_buf: Vec::new(),
            next_seq: 1,
        }
    }

    /// Address of the remote end
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Closed
        }
    }

    /// Receive up to `max_len` bytes, waiting at most `wait`.
    ///
    /// An empty read means the peer closed the stream; the connection is then
    /// closed and [`Received::Closed`] is returned. A transport error also
    /// closes the connection before it is returned.
    ///
    /// Reads are cancel safe, so a wait that times out loses no data.
    pub async fn recv_chunk(&mut self, max_len: usize, wait: Duration) -> std::io::Result<Received> {
        if max_len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "receive size must be at least 1 byte",
            ));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection is closed",
            ));
        };

        self.read_buf.resize(max_len, 0);
        let read = tokio::time::timeout(wait, stream.read(&mut self.read_buf)).await;
        match read {
            Err(_) => Ok(Received::Idle),
            Ok(Ok(0)) => {
                tracing::info!(peer = %self.peer, "Connection closed by peer");
                self.close().await;
                Ok(Received::Closed)
            }
            Ok(Ok(n)) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                Ok(Received::Chunk(Chunk {
                    seq,
                    data: self.read_buf[..n].to_vec(),
                }))
            }
            Ok(Err(e)) => {
                tracing::warn!(peer = %self.peer, error = %e, "Transport error while receiving");
                self.close().await;
                Err(e)
            }
        }
    }

    /// Release the transport.
    ///
    /// Only the first call does anything. A failing shutdown is logged and
    /// swallowed so it cannot mask the reason the loop stopped.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "Transport shutdown failed during close");
        }
        drop(stream);
        tracing::debug!(peer = %self.peer, "Connection closed");
    }
}
