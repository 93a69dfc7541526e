//! In-process store. Entries expire lazily on read and in bulk via the sweeper.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{KvStore, StoreResult, ttl_secs};
use crate::clock::Clock;
use gatehouse_common::GateError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Map-backed store sharing one clock with the throttles
#[derive(Clone, Debug)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| GateError::Store("memory store lock poisoned".to_string()))
    }

    /// Drop every expired entry, returning how many went
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok(before - entries.len())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    fn live_value(&self, entry: Option<Entry>) -> Option<String> {
        let now = self.clock.now();
        entry.filter(|e| e.expires_at > now).map(|e| e.value)
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entry = self.lock()?.get(key).cloned();
        Ok(self.live_value(entry))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.clock.now() + chrono::Duration::seconds(ttl_secs(ttl) as i64);
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let entry = self.lock()?.remove(key);
        Ok(self.live_value(entry))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

/// Background worker that periodically purges expired entries
pub async fn sweeper_worker(
    store: MemoryStore,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Memory store sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match store.purge_expired() {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, remaining = store.len(), "Purged expired entries"),
                    Err(e) => tracing::error!(error = %e, "Memory store sweep failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Memory store sweeper shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn store_with_clock() -> (MemoryStore, MockClock) {
        let clock = MockClock::default();
        (MemoryStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_set_get_expire() {
        let (store, clock) = store_with_clock();

        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance_secs(10);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let (store, _clock) = store_with_clock();

        store.set("token", "owner", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.take("token").await.unwrap().as_deref(), Some("owner"));
        assert_eq!(store.take("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_with_clock();

        store.set("short", "1", Duration::from_secs(5)).await.unwrap();
        store.set("long", "2", Duration::from_secs(500)).await.unwrap();
        clock.advance_secs(6);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("2"));
    }
}
