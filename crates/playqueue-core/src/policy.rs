//! Retry/backoff policy and per-attempt retry context.

use std::time::Duration;

use crate::classify::ErrorClass;

pub const DEFAULT_BACKOFF_SECS: [u64; 4] = [3, 8, 15, 30];
pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing knobs for one controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackPolicy {
    /// Delay before retry `n` is `backoff[n - 1]`; the last entry repeats.
    pub backoff: Vec<Duration>,
    /// Retry ceiling for blocking failures.
    pub max_retries: u32,
    /// Upper bound for one acquisition call.
    pub acquire_timeout: Duration,
    /// Pause before advancing after a generic failure.
    pub generic_failure_delay: Duration,
    /// Pause before advancing after retries were exhausted.
    pub final_failure_delay: Duration,
    /// Pause before starting the next item after one ends.
    pub advance_delay: Duration,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            max_retries: DEFAULT_MAX_RETRIES,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            generic_failure_delay: Duration::from_secs(2),
            final_failure_delay: Duration::from_secs(5),
            advance_delay: Duration::from_secs(1),
        }
    }
}

/// What to do after a failed acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-attempt the same item after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retry ceiling reached; drop the item.
    GiveUp { attempts: u32 },
    /// Not retryable; drop the item.
    Skip,
}

impl PlaybackPolicy {
    /// Delay before the 1-based retry `attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let Some(last) = self.backoff.last() else {
            return Duration::ZERO;
        };
        let index = attempt.saturating_sub(1) as usize;
        self.backoff.get(index).copied().unwrap_or(*last)
    }

    /// Record a failure in `ctx` and decide the next step.
    pub fn on_failure(&self, ctx: &mut RetryContext, class: ErrorClass) -> RetryDecision {
        ctx.last_error = Some(class);
        if !class.is_blocking() {
            return RetryDecision::Skip;
        }
        if ctx.attempt_count >= self.max_retries {
            return RetryDecision::GiveUp {
                attempts: ctx.attempt_count,
            };
        }
        ctx.attempt_count += 1;
        RetryDecision::Retry {
            attempt: ctx.attempt_count,
            delay: self.retry_delay(ctx.attempt_count),
        }
    }

    /// Policy with every pause zeroed except the backoff table.
    pub fn without_pauses(mut self) -> Self {
        self.generic_failure_delay = Duration::ZERO;
        self.final_failure_delay = Duration::ZERO;
        self.advance_delay = Duration::ZERO;
        self
    }
}

/// Retry bookkeeping for the item currently being attempted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryContext {
    /// Retries already scheduled for this item (0-based).
    pub attempt_count: u32,
    pub last_error: Option<ErrorClass>,
}

impl RetryContext {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
