// 🔁 Retry policy for "not ready yet" responses

use std::time::Duration;

/// How many times a "try again later" answer is tolerated, and how long to
/// wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_retries,
            backoff,
        }
    }

    /// Whether another attempt is allowed after `retries_so_far` retries.
    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// Delay before the next attempt. Fixed, whatever the attempt number.
    pub fn delay(&self, _retries_so_far: u32) -> Duration {
        self.backoff
    }

    /// Upper bound on time spent waiting before giving up.
    pub fn total_budget(&self) -> Duration {
        self.backoff * self.max_retries
    }
}

impl Default for RetryPolicy {
    /// Default: 24 retries, 5s apart (two minutes).
    fn default() -> Self {
        RetryPolicy::fixed(24, Duration::from_secs(5))
    }
}
