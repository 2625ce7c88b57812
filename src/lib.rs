//! tabfetch core library
//!
//! Finds the columns of a spreadsheet that hold image links and downloads
//! every link into a per-spreadsheet directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`table`] - Table access (`TableSource`), xlsx and in-memory providers
//! - [`detect`] - URL-column scoring, column selection, link extraction
//! - [`download`] - HTTP download engine with streaming, retry and integrity checks
//! - [`batch`] - Per-source glue from table to destination directory

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod detect;
pub mod download;
pub mod table;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use batch::{BatchCoordinator, CoordinatorOptions, SourceError, SourceReport, SourceResult};
pub use detect::{
    ColumnRequest, ColumnScore, SelectionError, detect_url_columns, extract_links,
    score_columns, select_columns, select_user_columns,
};
pub use download::{
    BatchSummary, CollisionPolicy, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadEngine,
    DownloadError, DownloadOutcome, EngineError, HttpClient, OutcomeStatus, RetryPolicy,
};
pub use table::{Column, ColumnId, InMemoryTable, TableError, TableSource, XlsxTable};
