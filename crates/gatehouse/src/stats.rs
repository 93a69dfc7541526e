//! Runtime counters reported on /metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use gatehouse_common::MetricsSnapshot;

#[derive(Default)]
pub struct GatewayStats {
    pub tokens_issued: AtomicU64,
    pub verify_requests: AtomicU64,
    pub verify_passed: AtomicU64,
    pub verify_rejected: AtomicU64,
    pub throttled: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub grants_claimed: AtomicU64,
}

impl GatewayStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            verify_requests: self.verify_requests.load(Ordering::Relaxed),
            verify_passed: self.verify_passed.load(Ordering::Relaxed),
            verify_rejected: self.verify_rejected.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            grants_claimed: self.grants_claimed.load(Ordering::Relaxed),
        }
    }
}
