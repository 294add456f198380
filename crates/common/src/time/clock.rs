//! Clock abstraction for deterministic time in tests.
//!
//! Components that reason about expiry or cooldowns take a [`Clock`] instead
//! of calling `Instant::now()` directly. Production wiring uses
//! [`SystemClock`]; tests use [`MockClock`] and advance it explicitly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Current wall-clock time in UTC.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        (**self).utc_now()
    }
}

/// Mock clock for deterministic testing
///
/// Both the monotonic and the wall clock start at the real time of creation
/// and only move when [`advance`](MockClock::advance) or
/// [`set_elapsed`](MockClock::set_elapsed) is called. Clones share the same
/// elapsed offset.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    wall_start: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a mock clock whose wall time starts at `wall_start`.
    pub fn starting_at(wall_start: DateTime<Utc>) -> Self {
        Self { start: Instant::now(), wall_start, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::MAX);
        self.wall_start.checked_add_signed(elapsed).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    /// Validates that advancing a mock clock moves both time sources.
    ///
    /// Assertions:
    /// - Monotonic time moves by exactly the advanced amount.
    /// - Wall time moves by exactly the advanced amount.
    /// - Clones observe the same offset.
    #[test]
    fn test_mock_clock_advance_moves_both_clocks() {
        let clock = MockClock::new();
        let shared = clock.clone();
        let instant_before = clock.now();
        let wall_before = clock.utc_now();

        clock.advance_secs(90);

        assert_eq!(shared.now().duration_since(instant_before), Duration::from_secs(90));
        assert_eq!((shared.utc_now() - wall_before).num_seconds(), 90);
    }

    #[test]
    fn test_mock_clock_set_elapsed() {
        let clock = MockClock::new();
        clock.advance_secs(10);
        clock.set_elapsed(Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_mock_clock_starting_at() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap();
        let clock = MockClock::starting_at(start);
        clock.advance(Duration::from_secs(3600));
        assert_eq!(clock.utc_now().to_rfc3339(), "2024-01-01T01:00:00+00:00");
    }
}
