//! Redis-backed variable reads (`SMEMBERS`, `HGETALL`, `GET`)

use super::{variable_key, KeyValueStore};
use crate::error::{IngestError, Result};
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Open a managed (auto-reconnecting) Redis connection
///
/// The manager is cheap to clone, so the audit log and the variable store
/// share one.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client =
        Client::open(url).map_err(|e| IngestError::Connection(format!("{}: {}", url, e)))?;
    let conn = ConnectionManager::new(client)
        .await
        .map_err(|e| IngestError::Connection(format!("{}: {}", url, e)))?;
    tracing::info!("Connected to Redis");
    Ok(conn)
}

/// Variable store backed by Redis
pub struct RedisKeyValueStore {
    conn: ConnectionManager,
}

impl RedisKeyValueStore {
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get_set_as_string_slice(&self, key: &str, hub: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut members: Vec<String> = conn.smembers(variable_key(hub, key)).await?;
        members.sort();
        Ok(members)
    }

    async fn get_map(&self, key: &str, hub: &str) -> Result<BTreeMap<String, String>> {
        let mut conn = self.conn.clone();
        let map: BTreeMap<String, String> = conn.hgetall(variable_key(hub, key)).await?;
        Ok(map)
    }

    async fn get_string(&self, key: &str, hub: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(variable_key(hub, key)).await?;
        Ok(value)
    }
}
