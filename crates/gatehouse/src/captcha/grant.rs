//! One-time redirect grants.
//!
//! Grants are keyed by client IP, the same owner CSRF tokens use, so a
//! plain GET from the verified client can claim one without resending its
//! device descriptor.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::store::{KvStore, StoreResult};
use gatehouse_common::constants::store_keys::GRANT_PREFIX;
use gatehouse_common::{GateError, RedirectGrant};

/// Holds grants until the verified client claims them
pub struct GrantLedger<S> {
    store: S,
    clock: Arc<dyn Clock>,
    destination: String,
    ttl: Duration,
}

impl<S: KvStore> GrantLedger<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, destination: String, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            destination,
            ttl,
        }
    }

    pub async fn issue(&self, owner: &str) -> StoreResult<RedirectGrant> {
        let grant = RedirectGrant {
            destination_url: self.destination.clone(),
            issued_at: self.clock.now(),
        };
        let data = serde_json::to_string(&grant)
            .map_err(|e| GateError::Internal(format!("encode grant: {}", e)))?;
        self.store.set(&key(owner), &data, self.ttl).await?;
        Ok(grant)
    }

    /// Hand out the grant once; later claims see nothing
    pub async fn claim(&self, owner: &str) -> StoreResult<Option<RedirectGrant>> {
        match self.store.take(&key(owner)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| GateError::Store(format!("corrupt grant: {}", e))),
            None => Ok(None),
        }
    }
}

fn key(owner: &str) -> String {
    format!("{}{}", GRANT_PREFIX, owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;

    fn ledger() -> (GrantLedger<MemoryStore>, MockClock) {
        let clock = MockClock::default();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = MemoryStore::new(shared.clone());
        let ledger = GrantLedger::new(
            store,
            shared,
            "https://www.example.com/success".to_string(),
            Duration::from_secs(120),
        );
        (ledger, clock)
    }

    #[tokio::test]
    async fn test_claim_once() {
        let (ledger, _clock) = ledger();

        ledger.issue("1.2.3.4").await.unwrap();
        let grant = ledger.claim("1.2.3.4").await.unwrap().unwrap();
        assert_eq!(grant.destination_url, "https://www.example.com/success");
        assert!(ledger.claim("1.2.3.4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grant_bound_to_owner() {
        let (ledger, _clock) = ledger();
        ledger.issue("1.2.3.4").await.unwrap();

        assert!(ledger.claim("4.3.2.1").await.unwrap().is_none());
        assert!(ledger.claim("1.2.3.4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_grant_expires() {
        let (ledger, clock) = ledger();

        ledger.issue("1.2.3.4").await.unwrap();
        clock.advance_secs(121);
        assert!(ledger.claim("1.2.3.4").await.unwrap().is_none());
    }
}
