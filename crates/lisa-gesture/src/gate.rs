//! Emission gate - debounces classified symbols before dispatch
//!
//! A symbol is emitted only when BOTH hold:
//! - more than `min_interval_ms` has passed since the last emission
//! - it differs from the last emitted symbol
//!
//! Frames that fail either test are dropped, never queued or retried.

use lisa_core::Timestamp;
use tracing::trace;

use crate::GestureSymbol;

/// Minimum spacing between emissions, in milliseconds.
///
/// The interval that has always shipped is 2000ms, even though it was
/// once described as "one per second".
pub const DEFAULT_MIN_INTERVAL_MS: i64 = 2000;

/// Temporal gesture state for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    /// Last emitted symbol (`None` until the first emission)
    pub last_symbol: GestureSymbol,
    /// Time of the last emission; `None` stands for minus infinity
    pub last_emit: Option<Timestamp>,
}

/// Rate limiter between the classifier and the dispatcher
#[derive(Debug, Clone)]
pub struct EmissionGate {
    state: GestureState,
    min_interval_ms: i64,
}

impl EmissionGate {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_MIN_INTERVAL_MS)
    }

    pub fn with_interval(min_interval_ms: i64) -> Self {
        EmissionGate {
            state: GestureState::default(),
            min_interval_ms,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn min_interval_ms(&self) -> i64 {
        self.min_interval_ms
    }

    /// Offer this frame's symbol. Returns the symbol if it should be
    /// dispatched; state changes only on emission.
    pub fn try_emit(&mut self, symbol: GestureSymbol, now: Timestamp) -> Option<GestureSymbol> {
        if symbol.is_none() {
            return None;
        }

        let interval_elapsed = match self.state.last_emit {
            None => true,
            Some(last) => now.since(last) > self.min_interval_ms,
        };

        if !interval_elapsed || symbol == self.state.last_symbol {
            trace!(
                symbol = %symbol,
                last = %self.state.last_symbol,
                interval_elapsed,
                "gesture suppressed"
            );
            return None;
        }

        self.state = GestureState {
            last_symbol: symbol,
            last_emit: Some(now),
        };
        Some(symbol)
    }

    /// Forget emission history
    pub fn reset(&mut self) {
        self.state = GestureState::default();
    }
}

impl Default for EmissionGate {
    fn default() -> Self {
        Self::new()
    }
}
