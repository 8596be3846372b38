//! Clock abstraction
//!
//! Every subsystem reads time through [`Clock`] so that expiry, lockout, and
//! rate-window behavior is deterministic under test. Timestamps are u64
//! nanoseconds since the Unix epoch throughout the workspace.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds in one day.
pub const NANOS_PER_DAY: u64 = 86_400 * NANOS_PER_SEC;

/// Convert whole seconds to nanoseconds.
pub const fn secs_to_ns(secs: u64) -> u64 {
    secs * NANOS_PER_SEC
}

/// Convert nanoseconds to whole seconds, rounding down.
pub const fn ns_to_secs(ns: u64) -> u64 {
    ns / NANOS_PER_SEC
}

/// Source of wall-clock time for the authority
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current time as nanoseconds since the Unix epoch
    fn now_ns(&self) -> u64;
}

/// Production clock backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Settable clock for deterministic tests
///
/// Clones share the same underlying instant, so a test can hold one handle
/// while the authority owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock starting at the given instant
    pub fn starting_at(now_ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(now_ns)),
        }
    }

    /// Set the clock to an absolute instant
    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Advance the clock by a delta
    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_handles_share_state() {
        let clock = ManualClock::starting_at(1_000);
        let handle = clock.clone();
        handle.advance(500);
        assert_eq!(clock.now_ns(), 1_500);
        clock.set(10);
        assert_eq!(handle.now_ns(), 10);
    }

    #[test]
    fn system_clock_is_past_epoch() {
        assert!(SystemClock.now_ns() > 0);
    }

    #[test]
    fn conversions() {
        assert_eq!(secs_to_ns(90), 90_000_000_000);
        assert_eq!(ns_to_secs(1_999_999_999), 1);
    }
}
