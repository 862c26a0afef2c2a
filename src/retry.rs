//! Pacing for the single retry.
//!
//! The upstream rate window is treated as a fixed 60 second window. Before
//! the retry the client waits until a full window has passed since its first
//! attempt. The window is a hardcoded policy; it is not read from response
//! headers.

use std::time::{Duration, Instant};

/// Length of the upstream rate window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Time to wait before the retry.
///
/// This is `window - (now - first_attempt)`. When that would be negative
/// (the first attempt is more than a window ago), the full window is used
/// instead of zero.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use vantage::retry::{pacing_delay, RATE_LIMIT_WINDOW};
///
/// let first = Instant::now();
///
/// let now = first + Duration::from_secs(20);
/// assert_eq!(pacing_delay(first, now, RATE_LIMIT_WINDOW), Duration::from_secs(40));
///
/// let now = first + Duration::from_secs(70);
/// assert_eq!(pacing_delay(first, now, RATE_LIMIT_WINDOW), Duration::from_secs(60));
/// ```
pub fn pacing_delay(first_attempt: Instant, now: Instant, window: Duration) -> Duration {
    let elapsed = now.saturating_duration_since(first_attempt);
    if elapsed > window {
        window
    } else {
        window - elapsed
    }
}

/// Call statistics kept for the lifetime of a client.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    total_calls: u64,
    first_attempt: Option<Instant>,
}

impl CallStats {
    /// Counts one transport call. The first call ever also fixes the first-attempt time.
    pub fn record_call(&mut self, at: Instant) {
        self.total_calls += 1;
        if self.first_attempt.is_none() {
            self.first_attempt = Some(at);
        }
    }

    /// Number of transport calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// When the first transport call was made.
    pub fn first_attempt(&self) -> Option<Instant> {
        self.first_attempt
    }

    /// Time to wait before a retry issued at `now`.
    ///
    /// With no recorded call yet, the full window.
    pub fn retry_delay(&self, now: Instant, window: Duration) -> Duration {
        match self.first_attempt {
            Some(first) => pacing_delay(first, now, window),
            None => window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_inside_window() {
        let first = Instant::now();
        let now = first + Duration::from_secs(15);
        assert_eq!(
            pacing_delay(first, now, RATE_LIMIT_WINDOW),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn test_negative_delay_clamps_to_full_window() {
        let first = Instant::now();
        let now = first + Duration::from_secs(70);
        assert_eq!(pacing_delay(first, now, RATE_LIMIT_WINDOW), RATE_LIMIT_WINDOW);
    }

    #[test]
    fn test_exact_window_waits_nothing() {
        let first = Instant::now();
        let now = first + RATE_LIMIT_WINDOW;
        assert_eq!(pacing_delay(first, now, RATE_LIMIT_WINDOW), Duration::ZERO);
    }

    #[test]
    fn test_first_call_fixes_first_attempt() {
        let mut stats = CallStats::default();
        assert_eq!(stats.retry_delay(Instant::now(), RATE_LIMIT_WINDOW), RATE_LIMIT_WINDOW);

        let first = Instant::now();
        stats.record_call(first);
        stats.record_call(first + Duration::from_secs(5));

        assert_eq!(stats.total_calls(), 2);
        assert_eq!(stats.first_attempt(), Some(first));
        assert_eq!(
            stats.retry_delay(first + Duration::from_secs(10), RATE_LIMIT_WINDOW),
            Duration::from_secs(50)
        );
    }
}
