//! Errors from a single download attempt.
//!
//! Every variant names the locator or path involved, so a failed outcome can
//! be reported without further context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read errors)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, rename)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The locator is not a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Bytes written do not match the declared Content-Length.
    #[error(
        "integrity check failed for {url}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// The URL whose body was incomplete.
        url: String,
        /// Declared size in bytes.
        expected_bytes: u64,
        /// Bytes actually written.
        actual_bytes: u64,
    },

    /// The batch was interrupted before this locator finished.
    #[error("interrupted before downloading {url}")]
    Interrupted {
        /// The URL that was not completed.
        url: String,
    },

    /// The task driving this locator panicked.
    #[error("download task for {url} panicked: {message}")]
    TaskPanicked {
        /// The URL the task was downloading.
        url: String,
        /// Join error text.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(url: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            url: url.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an interruption error.
    pub fn interrupted(url: impl Into<String>) -> Self {
        Self::Interrupted { url: url.into() }
    }

    /// Creates a task-panic error.
    pub fn task_panicked(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskPanicked {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Short stable label for summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::Io { .. } => "io",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Integrity { .. } => "integrity",
            Self::Interrupted { .. } => "interrupted",
            Self::TaskPanicked { .. } => "task_panicked",
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the
// url or path, which the source errors do not carry.
