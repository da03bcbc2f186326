//! Redis-backed pointer store client.
//!
//! Pointer records live under `sha:<subdomain>` keys. The connection manager
//! re-establishes dropped connections on its own; individual command failures
//! surface as [`StoreError`] and are absorbed upstream.

use redis::{AsyncCommands, Client, aio::ConnectionManager};

use async_trait::async_trait;

use super::{PointerStore, StoreError};

const KEY_PREFIX: &str = "sha:";

pub struct RedisPointerStore {
    manager: ConnectionManager,
}

impl RedisPointerStore {
    /// Connect to the pointer store at the given Redis URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|err| StoreError::pointer(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::pointer(err.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl PointerStore for RedisPointerStore {
    async fn lookup(&self, subdomain: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let version: Option<String> = conn
            .get(format!("{KEY_PREFIX}{subdomain}"))
            .await
            .map_err(|err| StoreError::pointer(err.to_string()))?;
        Ok(version)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|err| StoreError::pointer(err.to_string()))
    }
}
