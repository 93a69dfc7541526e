//! Wall clock abstraction so throttle windows can be driven in tests.

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// System clock backed by `Utc::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use mock::MockClock;

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Manually advanced clock. Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        current: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MockClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                current: Arc::new(Mutex::new(start)),
            }
        }

        pub fn advance_secs(&self, secs: i64) {
            let mut time = self.current.lock().expect("MockClock mutex poisoned");
            *time += chrono::Duration::seconds(secs);
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new(Utc::now())
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock().expect("MockClock mutex poisoned")
        }
    }
}
