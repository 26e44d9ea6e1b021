//! # Time Module
//!
//! Provides the `Timestamp` type and the `Clock` abstraction.
//!
//! ## Why Epoch Milliseconds?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE CACHE FORMAT                                                       │
//! │                                                                         │
//! │  Item records written by existing clients store:                       │
//! │    "created": 1718000000000, "modified": 1718000004211                 │
//! │                                                                         │
//! │  OUR SOLUTION: a transparent i64 newtype                               │
//! │    • Serializes as the same bare number                                │
//! │    • Ordered, so last-writer-wins is a plain comparison                │
//! │    • Converts to chrono::DateTime<Utc> only for display                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Clocks
//! The store never reads the system time directly. Every "now" comes from a
//! [`Clock`], so the recency window of the merge can be exercised with a
//! [`ManualClock`] instead of sleeping in tests.
//!
//! ```rust
//! use std::time::Duration;
//! use flashdeck_core::time::{Clock, ManualClock, Timestamp};
//!
//! let clock = ManualClock::new(Timestamp::from_millis(0));
//! clock.advance(Duration::from_millis(3_000));
//! assert_eq!(clock.now().millis(), 3_000);
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ts_rs::TS;

// =============================================================================
// Timestamp
// =============================================================================

/// A client-observed instant, in milliseconds since the Unix epoch.
///
/// ## Design Decisions
/// - **i64 (signed)**: matches what the cache already stores
/// - **`#[serde(transparent)]`**: the JSON form stays a bare number, and
///   the TypeScript binding is `number` to match
/// - **Default = 0**: records without a timestamp sort as "oldest"
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Timestamp(#[ts(type = "number")] i64);

impl Timestamp {
    /// Creates a timestamp from epoch milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    /// Returns the value in epoch milliseconds.
    #[inline]
    pub const fn millis(&self) -> i64 {
        self.0
    }

    /// The epoch itself. Used for records that never carried a timestamp.
    #[inline]
    pub const fn zero() -> Self {
        Timestamp(0)
    }

    /// Time elapsed from `earlier` to `self`.
    ///
    /// Returns `Duration::ZERO` when `earlier` is in the future (clock skew
    /// between clients is expected, never an error).
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use flashdeck_core::time::Timestamp;
    ///
    /// let t0 = Timestamp::from_millis(1_000);
    /// let t1 = Timestamp::from_millis(4_500);
    /// assert_eq!(t1.since(t0), Duration::from_millis(3_500));
    /// assert_eq!(t0.since(t1), Duration::ZERO);
    /// ```
    pub fn since(&self, earlier: Timestamp) -> Duration {
        let delta = self.0.saturating_sub(earlier.0);
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(delta as u64)
        }
    }

    /// Returns this timestamp shifted forward by `duration`.
    pub fn plus(&self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }

    /// Converts to a chrono `DateTime` (for display and logging).
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" for every timestamp the store assigns.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(Utc::now())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hold one handle while the
/// store and the sync engine hold others.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            millis: Arc::new(AtomicI64::new(start.millis())),
        }
    }

    /// Jumps to `at`. Moving backwards is allowed (simulates skew).
    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.millis(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let next = self.now().plus(duration);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typescript_binding_is_number() {
        assert_eq!(<Timestamp as TS>::inline(), "number");
    }

    #[test]
    fn test_timestamp_serializes_as_number() {
        let ts = Timestamp::from_millis(1_718_000_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1718000000000");

        let parsed: Timestamp = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.millis(), 42);
    }

    #[test]
    fn test_since_saturates_on_skew() {
        let early = Timestamp::from_millis(10_000);
        let late = Timestamp::from_millis(25_000);
        assert_eq!(late.since(early), Duration::from_secs(15));
        assert_eq!(early.since(late), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(Timestamp::zero());
        let other = clock.clone();

        clock.advance(Duration::from_millis(15_000));
        assert_eq!(other.now().millis(), 15_000);

        other.set(Timestamp::from_millis(3_000));
        assert_eq!(clock.now().millis(), 3_000);
    }

    #[test]
    fn test_datetime_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.to_datetime(), Some(dt));
    }
}
