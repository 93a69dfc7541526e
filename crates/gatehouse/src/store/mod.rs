//! Key-value storage with TTL.
//!
//! Throttle records, CSRF tokens, and redirect grants all live behind the
//! [`KvStore`] port. Two adapters exist:
//! - `MemoryStore` - process-local map, swept by a background worker
//! - `RedisStore` - shared Redis instance via a connection manager

mod memory;
mod redis_store;

pub use memory::{MemoryStore, sweeper_worker};
pub use redis_store::RedisStore;

use gatehouse_common::GateError;
use std::future::Future;
use std::time::Duration;

pub type StoreResult<T> = Result<T, GateError>;

/// Minimal key-value interface the gateway needs
pub trait KvStore: Send + Sync {
    /// Fetch a live value
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Store a value that disappears after `ttl`
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Fetch and delete in one step (single-use values)
    fn take(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Liveness probe for readiness checks
    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Backend chosen at startup
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Store {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

impl KvStore for Store {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Self::Memory(s) => s.get(key).await,
            Self::Redis(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.set(key, value, ttl).await,
            Self::Redis(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.delete(key).await,
            Self::Redis(s) => s.delete(key).await,
        }
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Self::Memory(s) => s.take(key).await,
            Self::Redis(s) => s.take(key).await,
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.ping().await,
            Self::Redis(s) => s.ping().await,
        }
    }
}

/// Whole seconds for a TTL, never zero
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_secs(60)), 60);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }
}
