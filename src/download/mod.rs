//! Streaming installer download.
//!
//! [`Downloader`] writes the response body of a single GET to
//! `<download dir>/<file name>`, replacing any file already there, and reports
//! [`DownloadProgress`] after every chunk the transport delivers. The file is
//! flushed, synced and closed before [`Downloader::download`] returns, so the
//! caller can hash it immediately. A download that fails or is dropped midway
//! leaves no file behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::BootstrapError;
use crate::transport::HttpTransport;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Byte counts reported while a download is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written so far
    pub received: u64,
    /// Total size announced by the server, if known
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completion percentage, or `None` when the total is unknown or zero.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                let percent = self.received.saturating_mul(100) / total;
                Some(percent.min(100) as u8)
            }
            _ => None,
        }
    }

    /// Status line in the form `Downloading <name>... 1.5 / 80.2 MB`.
    #[must_use]
    pub fn status_text(&self, file_name: &str) -> String {
        let received = self.received as f64 / BYTES_PER_MB;
        match self.total {
            Some(total) if total > 0 => format!(
                "Downloading {file_name}... {received:.1} / {:.1} MB",
                total as f64 / BYTES_PER_MB
            ),
            _ => format!("Downloading {file_name}... {received:.1} MB"),
        }
    }
}

/// Deletes a partially written download unless the transfer completed.
struct PartialFile {
    path: PathBuf,
    complete: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.complete {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial download {}: {}", self.path.display(), e),
        }
    }
}

/// Streams installers to local storage.
pub struct Downloader {
    transport: Arc<dyn HttpTransport>,
    download_dir: PathBuf,
    inactivity_timeout: Duration,
}

impl Downloader {
    /// Create a downloader writing into `download_dir`.
    ///
    /// The stream is abandoned if no chunk arrives for `inactivity_timeout`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        download_dir: impl Into<PathBuf>,
        inactivity_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            download_dir: download_dir.into(),
            inactivity_timeout,
        }
    }

    /// Directory downloads are written into.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download `url` to `<download dir>/<file_name>` and return the local path.
    pub async fn download<F>(
        &self,
        url: &str,
        file_name: &str,
        mut on_progress: F,
    ) -> Result<PathBuf, BootstrapError>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let path = self.download_dir.join(file_name);
        let write_error = |e: std::io::Error| BootstrapError::LocalWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let download_error = |reason: String| BootstrapError::DownloadError {
            url: url.to_string(),
            reason,
        };

        tokio::fs::create_dir_all(&self.download_dir).await.map_err(write_error)?;

        let mut body = self.transport.get(url).await.map_err(|e| download_error(e.message))?;
        let total = body.content_length;
        debug!("Downloading {} ({:?} bytes) to {}", url, total, path.display());

        // Declared before the file so the handle is closed before removal
        let mut partial = PartialFile {
            path: path.clone(),
            complete: false,
        };
        let mut file = tokio::fs::File::create(&path).await.map_err(write_error)?;
        let mut received: u64 = 0;

        loop {
            let chunk = match timeout(self.inactivity_timeout, body.chunks.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(download_error(e.message)),
                Ok(None) => break,
                Err(_) => {
                    return Err(download_error(format!(
                        "timed out: no data received for {} seconds after {} bytes",
                        self.inactivity_timeout.as_secs(),
                        received
                    )));
                }
            };

            file.write_all(&chunk).await.map_err(write_error)?;
            received += chunk.len() as u64;
            on_progress(DownloadProgress {
                received,
                total,
            });
        }

        file.flush().await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;
        drop(file);
        partial.complete = true;

        info!("Downloaded {} bytes to {}", received, path.display());
        Ok(path)
    }
}
