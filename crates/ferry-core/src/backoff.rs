//! Retry delay policies for [`RetryTask`](crate::task::RetryTask).

use std::time::Duration;

/// Source of delays between retry attempts.
///
/// A policy value holds its own attempt counter. `RetryTask` clones the
/// configured policy at the start of every run, so counters are never
/// shared between tasks or between runs.
pub trait Backoff: Clone + Send + Sync {
    /// Delay before the next attempt, or `None` to give up.
    fn next_delay(&mut self) -> Option<Duration>;
}

/// Same delay before every retry, up to `max_retries` retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBackoff {
    pub interval: Duration,
    pub max_retries: u32,
    attempts: u32,
}

impl ConstantBackoff {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            attempts: 0,
        }
    }
}

impl Backoff for ConstantBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        Some(self.interval)
    }
}

/// Delay grows by `multiplier` after every retry, capped at `max_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_retries: u32,
    current: Duration,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            max_retries,
            current: initial,
            attempts: 0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }
}

impl Default for ExponentialBackoff {
    /// Registry pushes and API calls: 1s, 2s, 4s, 8s, 16s.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        let delay = self.current.min(self.max_interval);
        self.current = self.current.mul_f64(self.multiplier).min(self.max_interval);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_gives_up_after_max_retries() {
        let mut backoff = ConstantBackoff::new(Duration::from_millis(10), 2);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), 5)
            .with_max_interval(Duration::from_secs(5));
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
    }

    #[test]
    fn exponential_custom_multiplier() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), 3).with_multiplier(3.0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(3)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(9)));
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn clones_start_from_the_configured_state() {
        let policy = ConstantBackoff::new(Duration::from_millis(1), 1);
        let mut first = policy.clone();
        assert!(first.next_delay().is_some());
        assert!(first.next_delay().is_none());

        let mut second = policy.clone();
        assert!(second.next_delay().is_some());
    }
}
