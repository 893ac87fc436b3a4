//! Session-local time
//!
//! All temporal decisions (gesture rate limiting, log stamps) use a
//! millisecond timestamp on a monotonic clock started with the session
//! controller. Wall-clock time is never consulted.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Milliseconds on the controller's monotonic clock
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Signed distance from `earlier` to `self` in milliseconds.
    /// Negative when `earlier` is actually later.
    #[inline]
    pub fn since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Monotonic clock anchored at construction
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        SessionClock {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.start.elapsed().as_millis() as i64)
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
