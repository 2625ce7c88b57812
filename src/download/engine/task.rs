use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use super::wait_for_interrupt;
use crate::download::outcome::{DownloadOutcome, OutcomeStatus};
use crate::download::retry::{RetryPolicy, TaskState};
use crate::download::{DownloadError, HttpClient};

/// One locator and where its bytes go.
#[derive(Debug)]
pub(super) struct DownloadJob {
    pub(super) index: usize,
    pub(super) locator: String,
    pub(super) final_path: PathBuf,
    pub(super) temp_path: PathBuf,
}

/// Outcome for a locator that was never started.
pub(super) fn interrupted_outcome(index: usize, locator: &str) -> DownloadOutcome {
    DownloadOutcome {
        index,
        locator: locator.to_string(),
        attempts: 0,
        backoff_delays: Vec::new(),
        status: OutcomeStatus::Failed {
            error: DownloadError::interrupted(locator),
        },
    }
}

/// Drives one locator through [`TaskState`] until it is terminal.
///
/// The interrupt flag is checked before each attempt and raced against
/// each backoff sleep.
#[instrument(skip(client, job, policy, interrupted), fields(index = job.index, url = %job.locator))]
pub(super) async fn download_with_retry(
    client: &HttpClient,
    job: DownloadJob,
    policy: &RetryPolicy,
    interrupted: &AtomicBool,
) -> DownloadOutcome {
    let mut state = TaskState::Pending.start();
    let mut backoff_delays = Vec::new();
    let mut last_error: Option<DownloadError> = None;
    let mut bytes_written = 0;
    let mut stopped = false;

    while !state.is_terminal() {
        state = match state {
            TaskState::Attempting { attempt } => {
                if interrupted.load(Ordering::SeqCst) {
                    stopped = true;
                    state.interrupt()
                } else {
                    debug!(attempt, "attempting download");
                    match client
                        .fetch_to_path(&job.locator, &job.final_path, &job.temp_path)
                        .await
                    {
                        Ok(bytes) => {
                            bytes_written = bytes;
                            state.on_success()
                        }
                        Err(e) => {
                            let next = state.on_failure(policy);
                            if let TaskState::RetryScheduled { next_attempt, delay } = next {
                                info!(
                                    url = %job.locator,
                                    attempt = next_attempt,
                                    max_attempts = policy.max_attempts(),
                                    delay_ms = delay.as_millis(),
                                    error = %e,
                                    "retrying download"
                                );
                            }
                            last_error = Some(e);
                            next
                        }
                    }
                }
            }
            TaskState::RetryScheduled { delay, .. } => {
                tokio::select! {
                    biased;
                    () = wait_for_interrupt(interrupted) => {
                        stopped = true;
                        state.interrupt()
                    }
                    () = tokio::time::sleep(delay) => {
                        backoff_delays.push(delay);
                        state.on_backoff_elapsed()
                    }
                }
            }
            other => other,
        };
    }

    let status = match state {
        TaskState::Succeeded { .. } => OutcomeStatus::Success {
            path: job.final_path,
            bytes: bytes_written,
        },
        _ => {
            let error = match last_error {
                Some(error) if !stopped => error,
                _ => DownloadError::interrupted(&job.locator),
            };
            warn!(
                url = %job.locator,
                error = %error,
                attempts = state.attempts(),
                "download failed after all attempts"
            );
            OutcomeStatus::Failed { error }
        }
    };

    DownloadOutcome {
        index: job.index,
        locator: job.locator,
        attempts: state.attempts(),
        backoff_delays,
        status,
    }
}
