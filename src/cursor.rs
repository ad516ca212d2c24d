//! Execution-time cursor (spec §4.8): a monotonic watermark used to bound
//! the REST catch-up path's "fetch executions since" query.
//!
//! A compare-exchange loop rather than a plain store so concurrent callers
//! (the WS read loop and a catch-up pass can both observe fills close in
//! time) never move the cursor backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default lookback applied when the cursor has never been set, per spec §4.8.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_millis(120_000);

pub struct ExecutionCursor(AtomicU64);

impl Default for ExecutionCursor {
    fn default() -> Self {
        Self(AtomicU64::new(0))
    }
}

impl ExecutionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the cursor to `ts_ms` if it is newer than the current value.
    pub fn maybe_advance(&self, ts_ms: u64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if ts_ms <= current {
                return;
            }
            match self
                .0
                .compare_exchange_weak(current, ts_ms, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Resolves the "since" bound for a catch-up query: the cursor if set,
    /// otherwise `now_ms - DEFAULT_LOOKBACK`.
    pub fn since_or_default(&self, now_ms: u64) -> u64 {
        let cursor = self.get();
        if cursor == 0 {
            now_ms.saturating_sub(DEFAULT_LOOKBACK.as_millis() as u64)
        } else {
            cursor
        }
    }
}
