//! HTTP client wrapper for fetching resources to disk.
//!
//! This module provides the `HttpClient` struct which streams a response body
//! into a temporary file, verifies it against the declared size and only then
//! moves it to its final name.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, REQUEST_DEADLINE_SECS, WRITE_CHUNK_SIZE,
};
use super::error::DownloadError;
use crate::user_agent;

/// Shared HTTP client; clones reuse one connection pool.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tabfetch::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let bytes = client
///     .fetch_to_path(
///         "https://example.com/a.jpg",
///         Path::new("./out/a.jpg"),
///         Path::new("./out/a.jpg.0.part"),
///     )
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Client with the default connect and read timeouts.
    ///
    /// # Panics
    ///
    /// See [`HttpClient::new_with_timeouts`].
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Client with explicit timeouts, in seconds.
    ///
    /// `read_timeout_secs` bounds the silence between two reads, so a slow
    /// body that keeps arriving is not cut off. The whole exchange is still
    /// capped at [`REQUEST_DEADLINE_SECS`].
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialised.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .timeout(Duration::from_secs(REQUEST_DEADLINE_SECS))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .expect("TLS backend unavailable");
        Self { client }
    }

    /// Fetches `locator` into `temp_path`, then renames it to `final_path`.
    ///
    /// Returns the number of bytes written. A file appears at `final_path`
    /// only when the whole body arrived: when the response declares a
    /// Content-Length, the bytes written must match it.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The locator is not a valid URL
    /// - The request fails (network error, timeout)
    /// - The server returns a non-success status
    /// - The body is shorter or longer than declared
    /// - Writing or renaming the file fails
    ///
    /// The temporary file is removed on every error path.
    #[instrument(skip(self, final_path, temp_path), fields(url = %locator, path = %final_path.display()))]
    pub async fn fetch_to_path(
        &self,
        locator: &str,
        final_path: &Path,
        temp_path: &Path,
    ) -> Result<u64, DownloadError> {
        let result = self.fetch_inner(locator, final_path, temp_path).await;
        if result.is_err() {
            discard_partial(temp_path).await;
        }
        result
    }

    async fn fetch_inner(
        &self,
        locator: &str,
        final_path: &Path,
        temp_path: &Path,
    ) -> Result<u64, DownloadError> {
        debug!("starting download");

        let url = Url::parse(locator.trim()).map_err(|_| DownloadError::invalid_url(locator))?;
        let response = self.send_request(locator, url).await?;

        // reqwest strips Content-Length when it decompresses, so a gzip body
        // is never checked against its compressed size.
        let declared_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut file = File::create(temp_path)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        let bytes_written = stream_to_file(&mut file, response, locator, temp_path).await?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        drop(file);

        verify_length(locator, declared_length, bytes_written)?;

        tokio::fs::rename(temp_path, final_path)
            .await
            .map_err(|e| DownloadError::io(final_path, e))?;

        info!(
            path = %final_path.display(),
            bytes = bytes_written,
            "download complete"
        );
        Ok(bytes_written)
    }

    async fn send_request(&self, locator: &str, url: Url) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(locator, status.as_u16()));
        }
        Ok(response)
    }
}

/// Checks bytes written against the declared Content-Length, if any.
pub(crate) fn verify_length(
    locator: &str,
    declared: Option<u64>,
    written: u64,
) -> Result<(), DownloadError> {
    match declared {
        Some(expected) if expected != written => {
            Err(DownloadError::integrity(locator, expected, written))
        }
        _ => Ok(()),
    }
}

fn transport_error(locator: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(locator)
    } else {
        DownloadError::network(locator, error)
    }
}

/// Copies the body into `file` and returns the byte count.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(WRITE_CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transport_error(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

async fn discard_partial(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(path = %temp_path.display(), "removed partial file after error"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %temp_path.display(), error = %e, "could not remove partial file"),
    }
}
