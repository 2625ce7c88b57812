//! Download engine for concurrent fetches with retry support.
//!
//! The engine takes an ordered list of locators and a destination directory,
//! downloads each locator in its own Tokio task, and returns exactly one
//! [`DownloadOutcome`] per locator, in input order.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tabfetch::download::{DownloadEngine, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(10, RetryPolicy::default())?;
//! let client = HttpClient::new();
//! let locators = vec!["https://example.com/a.jpg".to_string()];
//! let outcomes = engine.run(&client, &locators, Path::new("./out")).await?;
//! println!("{} outcome(s)", outcomes.len());
//! # Ok(())
//! # }
//! ```

mod task;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::filename::{CollisionPolicy, partial_path, plan_filenames};
use super::outcome::{BatchSummary, DownloadOutcome, OutcomeStatus};
use super::retry::RetryPolicy;
use super::{DownloadError, HttpClient};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How often waiting code re-checks the interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Download engine for concurrent file downloads with retry support.
///
/// # Concurrency Model
///
/// - Each locator runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task, so at most
///   `concurrency` fetches are in flight (backoff waits hold the permit)
/// - Permits are released automatically when tasks complete (RAII)
/// - Each [`run`](Self::run) owns its semaphore, so concurrent runs on one
///   engine do not share the bound
///
/// # Retry Behavior
///
/// Every failure is retried with exponential backoff until the policy's
/// attempt ceiling; see [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    /// Configured concurrency limit.
    concurrency: usize,
    /// Retry policy for failed downloads.
    retry_policy: RetryPolicy,
    /// Naming of targets that share a derived filename.
    collision_policy: CollisionPolicy,
}

impl DownloadEngine {
    /// Creates a new download engine with the specified concurrency limit and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use tabfetch::download::{DownloadEngine, RetryPolicy};
    ///
    /// let engine = DownloadEngine::new(10, RetryPolicy::default()).unwrap();
    /// assert_eq!(engine.concurrency(), 10);
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating download engine"
        );

        Ok(Self {
            concurrency,
            retry_policy,
            collision_policy: CollisionPolicy::default(),
        })
    }

    /// Sets how targets sharing a derived filename are named.
    #[must_use]
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the configured collision policy.
    #[must_use]
    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision_policy
    }

    /// Downloads every locator into `destination`.
    ///
    /// Returns one outcome per locator, ordered by input index. Individual
    /// download failures do NOT cause this method to error; they are
    /// reported as [`OutcomeStatus::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    pub async fn run(
        &self,
        client: &HttpClient,
        locators: &[String],
        destination: &Path,
    ) -> Result<Vec<DownloadOutcome>, EngineError> {
        self.run_interruptible(
            client,
            locators,
            destination,
            Arc::new(AtomicBool::new(false)),
        )
        .await
    }

    /// Downloads every locator, stopping early once `interrupted` is set.
    ///
    /// When the flag becomes `true`, no new task is started, running tasks
    /// stop before their next attempt or during their backoff, and every
    /// locator that did not finish is reported as
    /// [`DownloadError::Interrupted`]. The outcome count always equals the
    /// input count.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip(self, client, locators, interrupted), fields(destination = %destination.display(), locators = locators.len()))]
    pub async fn run_interruptible(
        &self,
        client: &HttpClient,
        locators: &[String],
        destination: &Path,
        interrupted: Arc<AtomicBool>,
    ) -> Result<Vec<DownloadOutcome>, EngineError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let names = plan_filenames(locators, self.collision_policy);
        let mut handles: Vec<(usize, JoinHandle<DownloadOutcome>)> = Vec::new();
        let mut outcomes: Vec<DownloadOutcome> = Vec::with_capacity(locators.len());

        info!("starting batch");

        for (index, (locator, name)) in locators.iter().zip(names).enumerate() {
            if interrupted.load(Ordering::SeqCst) {
                outcomes.push(task::interrupted_outcome(index, locator));
                continue;
            }

            // A full pool must not delay the reaction to an interrupt.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => None,
                result = Arc::clone(&semaphore).acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                outcomes.push(task::interrupted_outcome(index, locator));
                continue;
            };

            let final_path: PathBuf = destination.join(&name);
            let temp_path = partial_path(&final_path, index);
            debug!(index, url = %locator, path = %final_path.display(), "spawning download");

            let job = task::DownloadJob {
                index,
                locator: locator.clone(),
                final_path,
                temp_path,
            };
            let client = client.clone();
            let retry_policy = self.retry_policy.clone();
            let interrupted = Arc::clone(&interrupted);

            handles.push((
                index,
                tokio::spawn(async move {
                    // Held for the whole task, retries included.
                    let _permit = permit;
                    task::download_with_retry(&client, job, &retry_policy, &interrupted).await
                }),
            ));
        }

        debug!(
            task_count = handles.len(),
            "waiting for downloads to complete"
        );

        for (index, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(index, error = %e, "download task panicked");
                    outcomes.push(DownloadOutcome {
                        index,
                        locator: locators[index].clone(),
                        attempts: 0,
                        backoff_delays: Vec::new(),
                        status: OutcomeStatus::Failed {
                            error: DownloadError::task_panicked(&locators[index], e.to_string()),
                        },
                    });
                }
            }
        }
        outcomes.sort_by_key(|outcome| outcome.index);

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            retries = summary.retries,
            bytes = summary.bytes,
            interrupted = interrupted.load(Ordering::SeqCst),
            "batch complete"
        );

        Ok(outcomes)
    }
}

/// Resolves once `interrupted` is set.
pub(crate) async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}
