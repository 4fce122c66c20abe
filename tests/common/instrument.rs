//! In-process stand-in for the instrument's TCP stream

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// One scripted action of the fake instrument
#[derive(Clone, Debug)]
pub enum Step {
    /// Write these bytes and flush
    Send(Vec<u8>),
    /// Sleep before the next step
    Pause(Duration),
    /// Keep the connection open until the client closes it
    Hold,
}

/// A listening fake instrument serving one connection
pub struct MockInstrument {
    /// Port to connect to on 127.0.0.1
    pub port: u16,
    /// Resolves when the client side of the connection has gone away
    client_gone: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<()>,
}

impl MockInstrument {
    /// Bind on an ephemeral port and play `steps` to the first client.
    ///
    /// The connection is closed after the last step unless it is [`Step::Hold`].
    pub async fn spawn(steps: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock instrument");
        let port = listener.local_addr().expect("local addr").port();
        let (gone_tx, gone_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            for step in steps {
                match step {
                    Step::Send(bytes) => {
                        if socket.write_all(&bytes).await.is_err() {
                            break;
                        }
                        socket.flush().await.ok();
                    }
                    Step::Pause(d) => tokio::time::sleep(d).await,
                    Step::Hold => {
                        // Client never sends anything; a read returns when it closes
                        let mut buf = [0u8; 64];
                        while let Ok(n) = socket.read(&mut buf).await {
                            if n == 0 {
                                break;
                            }
                        }
                        gone_tx.send(()).ok();
                        return;
                    }
                }
            }
        });

        Self {
            port,
            client_gone: Some(gone_rx),
            handle,
        }
    }

    /// Wait until the client has closed a held connection
    pub async fn wait_client_gone(&mut self, timeout: Duration) -> bool {
        let Some(rx) = self.client_gone.take() else {
            return false;
        };
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(())))
    }

    /// Wait for the script to finish
    pub async fn finish(self) {
        self.handle.await.expect("mock instrument task");
    }
}

/// A port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
