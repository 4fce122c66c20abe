//! Durable output file for captured data.
//!
//! The sink is append-only. Each [`OutputSink::append`] writes the bytes
//! verbatim and syncs them to storage before returning, so data that has been
//! appended survives the process being killed right afterwards.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Owns the destination file handle
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl OutputSink {
    /// Create or truncate the file at `path` for writing.
    ///
    /// Parent directories are not created; a missing directory is an
    /// [`Error::Open`] like any other unwritable path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| {
                tracing::error!(path = %path.display(), error = %source, "Could not open output file");
                Error::Open {
                    path: path.clone(),
                    source,
                }
            })?;

        tracing::info!(path = %path.display(), "Saving data to output file");
        Ok(Self {
            path,
            file: Some(file),
            bytes_written: 0,
        })
    }

    /// Path of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes durably appended so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append `bytes` and force them to durable storage.
    pub async fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(self.write_error(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "output file is closed",
            )));
        };

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => {
                self.bytes_written += bytes.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.write_error(e)),
        }
    }

    /// Release the file handle.
    ///
    /// Only the first call does anything. Errors while releasing are logged,
    /// never returned, so they cannot hide why the capture stopped.
    pub async fn close(&mut self) {
        let Some(mut file) = self.file.take() else {
            return;
        };
        if let Err(e) = file.flush().await {
            tracing::warn!(path = %self.path.display(), error = %e, "Flush failed while closing output file");
        }
        drop(file);
        tracing::debug!(
            path = %self.path.display(),
            bytes_written = self.bytes_written,
            "Output file closed"
        );
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        tracing::error!(path = %self.path.display(), error = %source, "Write to output file failed");
        Error::Write {
            path: self.path.clone(),
            source,
        }
    }
}
