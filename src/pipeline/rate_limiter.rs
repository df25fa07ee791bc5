//! Sliding-window submission limiter.
//!
//! Keeps the wall-clock times (ms since epoch) of recent acquisitions and
//! persists them through the key-value store so a restart does not reset
//! the budget. Single client, best effort: clearing local state bypasses it.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::storage::kv_store::{KeyValueStore, RATE_LIMIT_KEY, read_json, write_json};

/// Acquisition times inside the window `(now - window_ms, now]`. An entry
/// exactly `window_ms` old counts as expired, so nothing kept is ever as old
/// as the window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub timestamps: VecDeque<i64>,
}

impl RateLimitWindow {
    /// Drops every entry at least `window_ms` old. Returns how many expired.
    fn prune(&mut self, now_ms: i64, window_ms: i64) -> usize {
        let before = self.timestamps.len();
        while let Some(&oldest) = self.timestamps.front() {
            if now_ms - oldest >= window_ms {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        before - self.timestamps.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Denied { retry_after_ms: i64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    window: RateLimitWindow,
    capacity: usize,
    window_ms: i64,
}

impl RateLimiter {
    /// Restores the persisted window, discarding anything already expired.
    pub fn load(store: Arc<dyn KeyValueStore>, capacity: usize, window_ms: i64) -> Self {
        let mut window: RateLimitWindow = read_json(store.as_ref(), RATE_LIMIT_KEY).unwrap_or_default();
        // Entries written by an older build may be unordered.
        window.timestamps.make_contiguous().sort_unstable();
        window.prune(Utc::now().timestamp_millis(), window_ms);
        Self {
            store,
            window,
            capacity,
            window_ms,
        }
    }

    pub fn try_acquire(&mut self) -> RateDecision {
        self.try_acquire_at(Utc::now().timestamp_millis())
    }

    pub fn try_acquire_at(&mut self, now_ms: i64) -> RateDecision {
        let expired = self.window.prune(now_ms, self.window_ms);

        let decision = if self.window.timestamps.len() >= self.capacity {
            let oldest = self.window.timestamps.front().copied().unwrap_or(now_ms);
            RateDecision::Denied {
                retry_after_ms: (oldest + self.window_ms - now_ms).max(0),
            }
        } else {
            self.window.timestamps.push_back(now_ms);
            RateDecision::Allowed {
                remaining: self.capacity - self.window.timestamps.len(),
            }
        };

        if decision.is_allowed() || expired > 0 {
            self.persist();
        }
        decision
    }

    pub fn in_window(&self) -> usize {
        self.window.timestamps.len()
    }

    fn persist(&self) {
        if let Err(err) = write_json(self.store.as_ref(), RATE_LIMIT_KEY, &self.window) {
            log::warn!("Failed to persist rate-limit window: {err}");
        }
    }
}
