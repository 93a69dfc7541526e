//! Block policies: one value object instead of one code path per variant.

use chrono::TimeDelta;
use std::time::Duration;

use gatehouse_common::Axis;
use gatehouse_common::constants::{
    ISSUANCE_MAX_ATTEMPTS, ISSUANCE_WINDOW_SECS, POLL_MAX_ATTEMPTS, POLL_WINDOW_SECS,
    VERIFY_MAX_ATTEMPTS, VERIFY_WINDOW_SECS,
};

/// How a throttle counts, blocks, and propagates blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPolicy {
    /// Length of the counting window
    pub window: Duration,
    /// Attempts allowed per window; the next one blocks
    pub max_attempts: u32,
    /// Axis tracked when cross-axis tracking is off
    pub primary: Axis,
    /// Track both axes and propagate blocks between them
    pub cross_axis: bool,
    /// Keep propagating past the first hop
    pub transitive: bool,
    /// Block the identity as soon as it verifies
    pub block_on_success: bool,
    /// A new fingerprint on an active IP is denied instead of adopted
    pub deny_fingerprint_change: bool,
}

impl BlockPolicy {
    /// Verification endpoint: one attempt per five minutes, both axes
    pub fn verification() -> Self {
        Self {
            window: Duration::from_secs(VERIFY_WINDOW_SECS),
            max_attempts: VERIFY_MAX_ATTEMPTS,
            primary: Axis::Fingerprint,
            cross_axis: true,
            transitive: false,
            block_on_success: true,
            deny_fingerprint_change: true,
        }
    }

    /// Cooldown polling: ten calls per minute per IP
    pub fn polling() -> Self {
        Self {
            window: Duration::from_secs(POLL_WINDOW_SECS),
            max_attempts: POLL_MAX_ATTEMPTS,
            primary: Axis::Ip,
            cross_axis: false,
            transitive: false,
            block_on_success: false,
            deny_fingerprint_change: false,
        }
    }

    /// CSRF token issuance flood limit
    pub fn issuance() -> Self {
        Self {
            window: Duration::from_secs(ISSUANCE_WINDOW_SECS),
            max_attempts: ISSUANCE_MAX_ATTEMPTS,
            ..Self::polling()
        }
    }

    pub fn tracked_axes(&self) -> Vec<Axis> {
        if self.cross_axis {
            vec![Axis::Ip, Axis::Fingerprint]
        } else {
            vec![self.primary]
        }
    }

    pub(crate) fn window_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.window.as_secs() as i64)
    }

    /// Hops a block travels from the axis that was blocked
    pub(crate) fn propagation_hops(&self) -> usize {
        match (self.cross_axis, self.transitive) {
            (false, _) => 0,
            (true, false) => 1,
            (true, true) => usize::MAX,
        }
    }
}
