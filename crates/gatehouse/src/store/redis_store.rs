//! Redis-backed store for deployments that share throttle state.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::{KvStore, StoreResult, ttl_secs};
use gatehouse_common::GateError;

/// Redis adapter (auto-reconnecting connection manager)
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { conn })
    }
}

fn store_err(e: redis::RedisError) -> GateError {
    GateError::Store(e.to_string())
}

impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(store_err)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(store_err)
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        // MULTI/EXEC instead of GETDEL keeps Redis < 6.2 working
        let mut conn = self.conn.clone();
        let (value, _deleted): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(key)
            .del(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(value)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
