//! Per-axis throttle bookkeeping.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State for one identity on one axis, within one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRecord {
    pub window_start: DateTime<Utc>,
    pub attempts: u32,
    /// Identifiers on the other axis seen with this one during the window
    pub peers: BTreeSet<String>,
    pub blocked: bool,
}

impl ThrottleRecord {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            attempts: 0,
            peers: BTreeSet::new(),
            blocked: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now - self.window_start >= window
    }

    /// Start a new window if the current one has run out
    pub fn refresh(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        if self.is_expired(now, window) {
            *self = Self::new(now);
        }
    }

    /// Whole seconds until the window ends, rounded up
    pub fn remaining_secs(&self, now: DateTime<Utc>, window: TimeDelta) -> u64 {
        let left = (self.window_start + window - now).num_milliseconds();
        if left <= 0 {
            0
        } else {
            (left as u64).div_ceil(1000)
        }
    }

    /// Block a peer-propagated axis with its own fresh window
    pub fn block_fresh(&mut self, now: DateTime<Utc>) {
        if !self.blocked {
            self.blocked = true;
            self.window_start = now;
        }
    }
}
