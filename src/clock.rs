//! Monotonic session clock for cursor-video synchronization.
//!
//! All relative-time math in the session manager and timeline synchronizer
//! goes through a single [`Clock`] so that pause accounting is immune to
//! wall-clock adjustments, and so tests can drive time by hand.
//!
//! [`SessionTimestamps`] pairs a monotonic `Instant` with a wall-clock
//! reading captured at the same moment, allowing conversion between the
//! two domains without drift.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Monotonic time source used for all relative-time math.
///
/// `now_ms` readings are guaranteed non-decreasing. `wall_now` is only used
/// for human-facing timestamps (`created_at`, `updated_at`) and carries no
/// ordering guarantee.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds on the monotonic clock.
    fn now_ms(&self) -> u64;

    /// Wall-clock reading for record timestamps.
    fn wall_now(&self) -> DateTime<Utc>;
}

/// Production clock backed by `Instant`.
///
/// The monotonic origin is the moment the clock was constructed, so readings
/// are small offsets rather than boot-relative ticks.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Shared freely via `Arc`; `advance` moves every reader forward together.
pub struct ManualClock {
    ms: AtomicU64,
    wall_origin: DateTime<Utc>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ms: AtomicU64::new(0),
            wall_origin: Utc::now(),
        })
    }

    /// Move the clock forward by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: u64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute reading. Readings never go backwards.
    pub fn set(&self, ms: u64) {
        self.ms.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }

    fn wall_now(&self) -> DateTime<Utc> {
        self.wall_origin + chrono::Duration::milliseconds(self.ms.load(Ordering::SeqCst) as i64)
    }
}

/// Monotonic + wall-clock pair captured at one moment.
///
/// Captured at session start so that collaborator timestamps (monotonic
/// offsets) can be rendered as wall-clock times for record metadata.
#[derive(Clone, Copy, Debug)]
pub struct SessionTimestamps {
    monotonic_ms: u64,
    wall: DateTime<Utc>,
}

impl SessionTimestamps {
    /// Capture both readings from the given clock as close together as possible.
    pub fn capture(clock: &dyn Clock) -> Self {
        Self {
            monotonic_ms: clock.now_ms(),
            wall: clock.wall_now(),
        }
    }

    /// The monotonic reading at capture time.
    pub fn monotonic_ms(&self) -> u64 {
        self.monotonic_ms
    }

    /// The wall-clock reading at capture time.
    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Convert a later monotonic reading to a wall-clock time.
    pub fn wall_at(&self, monotonic_ms: u64) -> DateTime<Utc> {
        let delta = monotonic_ms.saturating_sub(self.monotonic_ms);
        self.wall + chrono::Duration::milliseconds(delta as i64)
    }

    /// Milliseconds elapsed between capture and a later monotonic reading.
    pub fn elapsed_ms(&self, monotonic_ms: u64) -> u64 {
        monotonic_ms.saturating_sub(self.monotonic_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let b = clock.now_ms();
        assert!(b >= a + 10);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 500);
        clock.advance(1500);
        assert_eq!(clock.now_ms(), 2000);
    }

    #[test]
    fn test_manual_clock_set_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.set(1000);
        clock.set(400);
        assert_eq!(clock.now_ms(), 1000);
    }

    #[test]
    fn test_session_timestamps_elapsed() {
        let clock = ManualClock::new();
        clock.set(250);
        let ts = SessionTimestamps::capture(clock.as_ref());
        clock.advance(750);
        assert_eq!(ts.elapsed_ms(clock.now_ms()), 750);
        // Readings before capture clamp to zero rather than underflowing.
        assert_eq!(ts.elapsed_ms(100), 0);
    }

    #[test]
    fn test_session_timestamps_wall_at() {
        let clock = ManualClock::new();
        let ts = SessionTimestamps::capture(clock.as_ref());
        let later = ts.wall_at(clock.now_ms() + 2000);
        assert_eq!((later - ts.wall()).num_milliseconds(), 2000);
    }
}
