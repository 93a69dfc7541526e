//! Abuse throttle.
//!
//! Counts attempts per identity axis (IP, fingerprint), blocks an axis once
//! it exceeds its budget, and spreads blocks across axes that were seen
//! together in the same window.

mod limiter;
mod policy;
mod record;

pub use limiter::{Decision, DenyReason, Throttle};
pub use policy::BlockPolicy;
pub use record::ThrottleRecord;
