// Polling delay between lock acquisition attempts
// Fixed interval by default, with optional exponential backoff and jitter to spread out contenders

use std::time::Duration;

use rand::Rng;

/// Reference delay between attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Delay schedule for polling loops
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub interval: Duration,
    /// Upper bound for the backoff part of the delay
    pub max_interval: Duration,
    /// Growth factor per attempt (1.0 keeps the interval fixed)
    pub multiplier: f64,
    /// Upper bound of the uniform random delay added to every wait
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy {
    /// Poll every `interval`, without backoff or jitter
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Grow the interval by `multiplier` per attempt, capped at `max_interval`
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Add up to `jitter` of random delay to each wait
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given (zero-based) failed attempt
    ///
    /// Saturates instead of overflowing for very large intervals.
    pub fn delay(&self, attempt: u32) -> Duration {
        let grown = self.interval.as_secs_f64() * self.multiplier.powi(attempt.min(64) as i32);
        let capped = grown.min(self.max_interval.as_secs_f64()).max(0.0);
        let base = Duration::try_from_secs_f64(capped).unwrap_or(self.max_interval);

        if self.jitter.is_zero() {
            return base;
        }
        let max_jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::rng().random_range(0..=max_jitter_ms);
        base.saturating_add(Duration::from_millis(jitter_ms))
    }
}
