//! Retry policy and the per-locator task state machine.
//!
//! Every failed attempt is retried until the attempt ceiling is reached,
//! whatever the cause: network errors, non-success statuses, truncated
//! bodies and local I/O failures are all treated alike. Only the delay
//! between attempts grows, exponentially in the attempt number.
//!
//! A task moves through [`TaskState`]:
//!
//! ```text
//! Pending → Attempting ─┬→ Succeeded
//!              ↑        ├→ RetryScheduled(delay) ─┘ (after the delay)
//!              │        └→ Failed
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tabfetch::download::{RetryPolicy, TaskState};
//!
//! let policy = RetryPolicy::new(2, Duration::from_secs(2), Duration::from_secs(60), 2.0)
//!     .with_max_jitter(Duration::ZERO);
//! let state = TaskState::Pending.start().on_failure(&policy);
//! assert_eq!(
//!     state,
//!     TaskState::RetryScheduled { next_attempt: 2, delay: Duration::from_secs(2) }
//! );
//! let state = state.on_backoff_elapsed().on_failure(&policy);
//! assert_eq!(state, TaskState::Failed { attempts: 2 });
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

/// Default maximum attempts per locator, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (2 seconds).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default maximum delay cap (60 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default maximum jitter added to delays (250ms).
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 2 seconds
/// - `max_delay`: 60 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 250ms
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(base_delay * multiplier^(n-1), max_delay) + jitter
/// ```
///
/// where `n` is the attempt that just failed. With defaults the waits are
/// about 2s and 4s before the second and third attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay after the first failed attempt.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f32,

    /// Upper bound of the random jitter added to each delay.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (clamped to >= 1)
    /// * `base_delay` - Delay after the first failure
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter bound; `Duration::ZERO` makes delays deterministic.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Backoff before the attempt following `attempt`, without jitter.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay(attempt) + self.calculate_jitter()
    }

    /// Generates random jitter between 0 and `max_jitter`.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Lifecycle of one locator inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not started.
    Pending,
    /// A fetch is in flight.
    Attempting {
        /// 1-indexed attempt number.
        attempt: u32,
    },
    /// Waiting out the backoff before the next attempt.
    RetryScheduled {
        /// Attempt that follows the delay.
        next_attempt: u32,
        /// Backoff to wait.
        delay: Duration,
    },
    /// Terminal: the file is in place.
    Succeeded {
        /// Attempts used.
        attempts: u32,
    },
    /// Terminal: attempts exhausted or the batch was interrupted.
    Failed {
        /// Attempts used.
        attempts: u32,
    },
}

impl TaskState {
    /// `Pending → Attempting(1)`. Other states are returned unchanged.
    #[must_use]
    pub fn start(self) -> Self {
        match self {
            Self::Pending => Self::Attempting { attempt: 1 },
            other => other,
        }
    }

    /// `Attempting(n) → Succeeded(n)`.
    #[must_use]
    pub fn on_success(self) -> Self {
        match self {
            Self::Attempting { attempt } => Self::Succeeded { attempts: attempt },
            other => other,
        }
    }

    /// `Attempting(n) → RetryScheduled(n+1, delay)` or `Failed(n)` once the
    /// policy's ceiling is reached.
    #[must_use]
    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self {
            Self::Attempting { attempt } => match policy.should_retry(attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => Self::RetryScheduled {
                    next_attempt,
                    delay,
                },
                RetryDecision::DoNotRetry { .. } => Self::Failed { attempts: attempt },
            },
            other => other,
        }
    }

    /// `RetryScheduled(n) → Attempting(n)`.
    #[must_use]
    pub fn on_backoff_elapsed(self) -> Self {
        match self {
            Self::RetryScheduled { next_attempt, .. } => Self::Attempting {
                attempt: next_attempt,
            },
            other => other,
        }
    }

    /// Ends a non-terminal task as `Failed`, counting only attempts that ran.
    #[must_use]
    pub fn interrupt(self) -> Self {
        match self {
            Self::Pending => Self::Failed { attempts: 0 },
            Self::Attempting { attempt } => Self::Failed {
                attempts: attempt.saturating_sub(1),
            },
            Self::RetryScheduled { next_attempt, .. } => Self::Failed {
                attempts: next_attempt.saturating_sub(1),
            },
            terminal => terminal,
        }
    }

    /// Whether the task has reached `Succeeded` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Attempts used so far (completed ones for non-terminal states).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match *self {
            Self::Pending => 0,
            Self::Attempting { attempt } => attempt.saturating_sub(1),
            Self::RetryScheduled { next_attempt, .. } => next_attempt.saturating_sub(1),
            Self::Succeeded { attempts } | Self::Failed { attempts } => attempts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy_without_jitter(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_secs(2),
            Duration::from_secs(60),
            2.0,
        )
        .with_max_jitter(Duration::ZERO)
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert!((policy.backoff_multiplier - 2.0).abs() < f32::EPSILON);
        assert_eq!(policy.max_jitter, Duration::from_millis(250));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 2.0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_each_attempt() {
        let policy = policy_without_jitter(5);
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_with_jitter_within_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0)
            .with_max_jitter(Duration::from_millis(500));
        for _ in 0..50 {
            let delay = policy.calculate_delay(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_should_retry_until_ceiling() {
        let policy = policy_without_jitter(3);
        assert_eq!(
            policy.should_retry(1),
            RetryDecision::Retry {
                delay: Duration::from_secs(2),
                attempt: 2
            }
        );
        assert_eq!(
            policy.should_retry(2),
            RetryDecision::Retry {
                delay: Duration::from_secs(4),
                attempt: 3
            }
        );
        assert!(matches!(
            policy.should_retry(3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = policy_without_jitter(1);
        match policy.should_retry(1) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("1")),
            other => panic!("expected DoNotRetry, got {other:?}"),
        }
    }

    // ==================== TaskState Tests ====================

    /// Drives a task whose every attempt fails and counts attempts made.
    fn run_always_failing(policy: &RetryPolicy) -> (TaskState, u32, Vec<Duration>) {
        let mut state = TaskState::Pending.start();
        let mut attempts = 0;
        let mut delays = Vec::new();
        while !state.is_terminal() {
            state = match state {
                TaskState::Attempting { .. } => {
                    attempts += 1;
                    state.on_failure(policy)
                }
                TaskState::RetryScheduled { delay, .. } => {
                    delays.push(delay);
                    state.on_backoff_elapsed()
                }
                other => panic!("unexpected state {other:?}"),
            };
        }
        (state, attempts, delays)
    }

    #[test]
    fn test_always_failing_task_makes_exactly_max_attempts() {
        for max_attempts in 1..=5 {
            let policy = policy_without_jitter(max_attempts);
            let (state, attempts, delays) = run_always_failing(&policy);
            assert_eq!(state, TaskState::Failed { attempts: max_attempts });
            assert_eq!(attempts, max_attempts);
            assert_eq!(delays.len() as u32, max_attempts - 1);
        }
    }

    #[test]
    fn test_backoff_delays_recorded_between_attempts() {
        let (_, _, delays) = run_always_failing(&policy_without_jitter(3));
        assert_eq!(delays, [Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn test_success_after_retries() {
        let policy = policy_without_jitter(3);
        let state = TaskState::Pending
            .start()
            .on_failure(&policy)
            .on_backoff_elapsed()
            .on_failure(&policy)
            .on_backoff_elapsed()
            .on_success();
        assert_eq!(state, TaskState::Succeeded { attempts: 3 });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_terminal_states_ignore_further_events() {
        let policy = policy_without_jitter(3);
        let done = TaskState::Succeeded { attempts: 1 };
        assert_eq!(done.on_failure(&policy), done);
        assert_eq!(done.start(), done);
        assert_eq!(done.interrupt(), done);
        let failed = TaskState::Failed { attempts: 3 };
        assert_eq!(failed.on_success(), failed);
    }

    #[test]
    fn test_interrupt_counts_completed_attempts() {
        assert_eq!(TaskState::Pending.interrupt(), TaskState::Failed { attempts: 0 });
        assert_eq!(
            TaskState::Attempting { attempt: 1 }.interrupt(),
            TaskState::Failed { attempts: 0 }
        );
        assert_eq!(
            TaskState::RetryScheduled {
                next_attempt: 3,
                delay: Duration::from_secs(4)
            }
            .interrupt(),
            TaskState::Failed { attempts: 2 }
        );
    }

    #[test]
    fn test_attempts_accessor() {
        assert_eq!(TaskState::Pending.attempts(), 0);
        assert_eq!(TaskState::Attempting { attempt: 2 }.attempts(), 1);
        assert_eq!(TaskState::Succeeded { attempts: 2 }.attempts(), 2);
    }
}
