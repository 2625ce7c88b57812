//! HTTP download engine for streaming resources to disk.
//!
//! # Features
//!
//! - Streaming downloads into a per-task `.part` file, renamed into place
//!   only after the body matches its declared size
//! - Filenames from the last URL path segment, with a synthesized fallback
//! - Bounded concurrency with a semaphore, one Tokio task per locator
//! - Exponential-backoff retries driven by an explicit task state machine
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tabfetch::download::{BatchSummary, DownloadEngine, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(10, RetryPolicy::default())?;
//! let locators = vec!["https://example.com/a.jpg".to_string()];
//! let outcomes = engine
//!     .run(&HttpClient::new(), &locators, Path::new("./downloads"))
//!     .await?;
//! let summary = BatchSummary::from_outcomes(&outcomes);
//! println!("Downloaded: {}, Failed: {}", summary.succeeded, summary.failed);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
pub mod filename;
mod outcome;
mod retry;

pub use client::HttpClient;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, REQUEST_DEADLINE_SECS};
pub use engine::{DEFAULT_CONCURRENCY, DownloadEngine, EngineError};
pub use error::DownloadError;
pub use filename::CollisionPolicy;
pub use outcome::{BatchSummary, DownloadOutcome, OutcomeStatus};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy, TaskState};
