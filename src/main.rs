//! agc-stream command line client
//!
//! Usage: agc-stream <host> [port] [output_file]

use agc_stream::config::connect_timeout_from_secs;
use agc_stream::stats::StatsSnapshot;
use agc_stream::{Config, Error, Event, ShutdownCoordinator, StreamClient};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Receive streaming CSV data from the Alpha Gamma Counter and save it to a file"
)]
struct Args {
    /// Instrument IP address or hostname
    host: Option<String>,

    /// Instrument TCP port (default: 8888)
    port: Option<u16>,

    /// Output file (default: unified_timestamps_<YYYYmmdd_HHMMSS>.csv)
    output: Option<PathBuf>,

    /// Load settings from a JSON file; positional arguments override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Give up connecting after this many seconds
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<f64>,

    /// Maximum bytes taken per receive call
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Longest wait per receive before re-checking for Ctrl+C
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Print the capture summary as JSON when done
    #[arg(long)]
    summary_json: bool,

    /// Verbose logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_directive = if args.verbose {
        "agc_stream=debug"
    } else {
        "agc_stream=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = match build_config(&args).and_then(StreamClient::new) {
        Ok(client) => client,
        Err(Error::Config { key, message }) if key.as_deref() == Some("host") => {
            println!("ERROR: {message}");
            println!("Usage: agc-stream <host> [port] [output_file]");
            println!("Example: agc-stream 192.168.1.50 8888 data.csv");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            println!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    let renderer = spawn_renderer(client.subscribe());
    let shutdown = ShutdownCoordinator::install(Some(client.event_sender()));

    let result = client.run(shutdown.token()).await;

    // Closing every sender lets the renderer drain and exit
    drop(shutdown);
    drop(client);
    renderer.await.ok();

    match result {
        Ok(summary) => {
            if args.summary_json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::error!(error = %e, "Could not serialize capture summary"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) if !e.is_fatal() => {
            println!("{e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> agc_stream::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout = Some(connect_timeout_from_secs(secs)?);
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }

    Ok(config)
}

fn spawn_renderer(mut events: broadcast::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = Renderer::default();
        let mut stdout = std::io::stdout();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let text = renderer.render(&event);
                    stdout.write_all(text.as_bytes()).ok();
                    stdout.flush().ok();
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Status display fell behind, skipped events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Turns capture events into operator-facing console text
#[derive(Default)]
struct Renderer {
    /// A `\r` status line is on screen without a trailing newline
    status_open: bool,
}

impl Renderer {
    fn render(&mut self, event: &Event) -> String {
        let text = match event {
            Event::Connecting { host, port } => format!("Connecting to {host}:{port}...\n"),
            Event::Connected { .. } => "Connected successfully!\n".to_string(),
            Event::SinkOpened { path } => format!(
                "Saving data to: {}\nPress Ctrl+C to stop and close connection\n",
                path.display()
            ),
            Event::Status { stats } => {
                self.status_open = true;
                return format!("\r{}", stats.status_line());
            }
            Event::PeerClosed => "Connection closed by peer\n".to_string(),
            Event::ShutdownRequested { signal } => {
                format!("Received {signal}, closing connection...\n")
            }
            Event::ReceiveFailed { error } => format!("ERROR during data reception: {error}\n"),
            Event::WriteFailed { error } => format!("ERROR writing output file: {error}\n"),
            Event::Finished { stats, .. } => final_stats(stats),
            Event::Saved { path } => format!("Data saved to: {}\n", path.display()),
        };

        if std::mem::take(&mut self.status_open) {
            format!("\n{text}")
        } else {
            text
        }
    }
}

fn final_stats(stats: &StatsSnapshot) -> String {
    let [first, second] = stats.summary_lines();
    format!("{first}\n{second}\n")
}
