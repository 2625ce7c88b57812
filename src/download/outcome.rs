//! Per-locator results and batch totals.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::error::DownloadError;

/// Final result of one locator.
#[derive(Debug)]
pub enum OutcomeStatus {
    /// The resource is at `path`.
    Success {
        /// Final file location.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// Every attempt failed; `error` is the last one.
    Failed {
        /// Error from the final attempt.
        error: DownloadError,
    },
}

/// What happened to one locator of a batch.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Position of the locator in the input list.
    pub index: usize,
    /// The locator as given.
    pub locator: String,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Backoff waited before each retry, in order.
    pub backoff_delays: Vec<Duration>,
    /// Terminal status.
    pub status: OutcomeStatus,
}

impl DownloadOutcome {
    /// Whether the locator was downloaded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// The final error, for failed locators.
    #[must_use]
    pub fn error(&self) -> Option<&DownloadError> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            OutcomeStatus::Success { .. } => None,
        }
    }

    /// Retries made (attempts beyond the first).
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Totals over a batch of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Locators downloaded.
    pub succeeded: usize,
    /// Locators that failed.
    pub failed: usize,
    /// Retries across all locators.
    pub retries: u64,
    /// Bytes written across all successes.
    pub bytes: u64,
}

impl BatchSummary {
    /// Tallies `outcomes`.
    #[must_use]
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            summary.retries += u64::from(outcome.retries());
            match &outcome.status {
                OutcomeStatus::Success { bytes, .. } => {
                    summary.succeeded += 1;
                    summary.bytes += bytes;
                }
                OutcomeStatus::Failed { .. } => summary.failed += 1,
            }
            summary
        })
    }

    /// Locators processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(index: usize, attempts: u32, bytes: u64) -> DownloadOutcome {
        DownloadOutcome {
            index,
            locator: format!("http://x/{index}.jpg"),
            attempts,
            backoff_delays: Vec::new(),
            status: OutcomeStatus::Success {
                path: PathBuf::from(format!("/out/{index}.jpg")),
                bytes,
            },
        }
    }

    fn failure(index: usize, attempts: u32) -> DownloadOutcome {
        DownloadOutcome {
            index,
            locator: format!("http://x/{index}.jpg"),
            attempts,
            backoff_delays: Vec::new(),
            status: OutcomeStatus::Failed {
                error: DownloadError::http_status("u", 500),
            },
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let outcomes = vec![success(0, 1, 10), failure(1, 3), success(2, 2, 5)];
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retries, 3);
        assert_eq!(summary.bytes, 15);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_summary_of_empty_batch() {
        assert_eq!(BatchSummary::from_outcomes(&[]), BatchSummary::default());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = success(0, 1, 1);
        assert!(ok.is_success());
        assert!(ok.error().is_none());
        assert_eq!(ok.retries(), 0);

        let failed = failure(1, 3);
        assert!(!failed.is_success());
        assert_eq!(failed.error().map(DownloadError::kind), Some("http_status"));
        assert_eq!(failed.retries(), 2);
    }
}
