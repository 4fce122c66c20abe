//! Signal-driven cooperative shutdown.
//!
//! [`ShutdownCoordinator::install`] registers interest in SIGINT and SIGTERM
//! (Ctrl+C on non-Unix targets) and cancels a [`CancellationToken`] when one
//! arrives. The receive loop holds a clone of the token and checks it at the
//! top of every iteration; nothing else ever writes it and it is never reset.

use crate::types::Event;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the cancellation flag and the signal listener that sets it
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl ShutdownCoordinator {
    /// Coordinator with no signal handling; only [`cancel`](Self::cancel) sets the flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Register signal handlers and start listening.
    ///
    /// Must be called from within a Tokio runtime. Handlers are registered
    /// before this returns, so a signal delivered right afterwards is not
    /// lost. When `events` is given, a [`Event::ShutdownRequested`] naming the
    /// signal is broadcast before the flag is set.
    pub fn install(events: Option<broadcast::Sender<Event>>) -> Self {
        let token = CancellationToken::new();
        let signals = SignalListener::register();

        let flag = token.clone();
        let listener = tokio::spawn(async move {
            let signal = signals.recv().await;
            tracing::info!(signal, "Received shutdown signal, closing connection");
            if let Some(events) = events {
                events
                    .send(Event::ShutdownRequested {
                        signal: signal.to_string(),
                    })
                    .ok();
            }
            flag.cancel();
        });

        Self {
            token,
            listener: Some(listener),
        }
    }

    /// Read-only handle for the receive loop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown without a signal
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Termination signal subscriptions.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
struct SignalListener {
    sigterm: Option<tokio::signal::unix::Signal>,
    sigint: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl SignalListener {
    fn register() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        // Registration may fail in restricted environments (containers, tests)
        let sigterm = signal(SignalKind::terminate())
            .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGTERM handler"))
            .ok();
        let sigint = signal(SignalKind::interrupt())
            .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGINT handler"))
            .ok();

        Self { sigterm, sigint }
    }

    async fn recv(mut self) -> &'static str {
        match (self.sigterm.as_mut(), self.sigint.as_mut()) {
            (Some(sigterm), Some(sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigint.recv() => "SIGINT",
                }
            }
            (Some(sigterm), None) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            (None, Some(sigint)) => {
                sigint.recv().await;
                "SIGINT"
            }
            (None, None) => {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
                "Ctrl+C"
            }
        }
    }
}

#[cfg(not(unix))]
struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn register() -> Self {
        Self
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
