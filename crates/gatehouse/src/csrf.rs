//! Anti-forgery tokens bound to the requesting IP.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::store::{KvStore, StoreResult};
use gatehouse_common::constants::store_keys::CSRF_PREFIX;
use gatehouse_common::{CsrfToken, GateError};

/// What the store keeps for an outstanding token
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Issues and checks CSRF tokens
pub struct CsrfVault<S> {
    store: S,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    single_use: bool,
}

impl<S: KvStore> CsrfVault<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, ttl: Duration, single_use: bool) -> Self {
        Self {
            store,
            clock,
            ttl,
            single_use,
        }
    }

    /// Mint a token for `owner`
    pub async fn issue(&self, owner: &str) -> StoreResult<CsrfToken> {
        let value = generate_token();
        let expires_at = self.clock.now() + TimeDelta::seconds(self.ttl.as_secs() as i64);

        let stored = StoredToken {
            owner: owner.to_string(),
            expires_at,
        };
        let data = serde_json::to_string(&stored)
            .map_err(|e| GateError::Internal(format!("encode csrf token: {}", e)))?;
        self.store.set(&key(&value), &data, self.ttl).await?;

        tracing::debug!(owner = %owner, ttl_secs = self.ttl.as_secs(), "Issued CSRF token");

        Ok(CsrfToken {
            value,
            owner: owner.to_string(),
            expires_at,
        })
    }

    /// Check a presented token; consumes it when tokens are single-use
    pub async fn validate(&self, value: &str, owner: &str) -> Result<(), GateError> {
        let stored = if self.single_use {
            self.store.take(&key(value)).await?
        } else {
            self.store.get(&key(value)).await?
        };

        let Some(raw) = stored else {
            return Err(GateError::Forbidden("Invalid or expired CSRF token".to_string()));
        };
        let token: StoredToken = serde_json::from_str(&raw)
            .map_err(|e| GateError::Store(format!("corrupt csrf token: {}", e)))?;

        if self.clock.now() >= token.expires_at {
            return Err(GateError::Forbidden("Invalid or expired CSRF token".to_string()));
        }

        if token.owner != owner {
            tracing::warn!(
                expected = %token.owner,
                presented_by = %owner,
                "CSRF token presented by a different client"
            );
            return Err(GateError::Forbidden("Invalid CSRF token".to_string()));
        }

        Ok(())
    }
}

fn key(value: &str) -> String {
    format!("{}{}", CSRF_PREFIX, value)
}

/// 32 random bytes, URL-safe
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;
    use tokio_test::{assert_err, assert_ok};

    fn vault(single_use: bool) -> (CsrfVault<MemoryStore>, MockClock) {
        let clock = MockClock::default();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = MemoryStore::new(shared.clone());
        (
            CsrfVault::new(store, shared, Duration::from_secs(60), single_use),
            clock,
        )
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let (vault, _clock) = vault(true);
        let token = vault.issue("1.2.3.4").await.unwrap();

        assert_eq!(token.value.len(), 43);
        assert_ok!(vault.validate(&token.value, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_single_use() {
        let (vault, _clock) = vault(true);
        let token = vault.issue("1.2.3.4").await.unwrap();

        assert_ok!(vault.validate(&token.value, "1.2.3.4").await);
        assert_err!(vault.validate(&token.value, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_reusable_within_lifetime() {
        let (vault, clock) = vault(false);
        let token = vault.issue("1.2.3.4").await.unwrap();

        assert_ok!(vault.validate(&token.value, "1.2.3.4").await);
        clock.advance_secs(59);
        assert_ok!(vault.validate(&token.value, "1.2.3.4").await);
        clock.advance_secs(1);
        assert_err!(vault.validate(&token.value, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_owner_mismatch_rejected() {
        let (vault, _clock) = vault(false);
        let token = vault.issue("1.2.3.4").await.unwrap();

        let err = vault.validate(&token.value, "9.9.9.9").await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (vault, _clock) = vault(true);
        assert_err!(vault.validate("forged", "1.2.3.4").await);
    }
}
