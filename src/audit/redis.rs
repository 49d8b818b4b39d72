//! Redis stream audit log
//!
//! Entries go to one stream via `XADD <key> MINID <threshold> * field value ...`,
//! which trims everything below the retention threshold in the same call.

use super::{min_id_threshold, now_millis, AuditLog, AuditRecord, StoredRecord};
use crate::error::Result;
use ::redis::aio::ConnectionManager;
use ::redis::streams::StreamRangeReply;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Audit log backed by a Redis stream
pub struct RedisAuditLog {
    conn: ConnectionManager,
    key: String,
    retention: Duration,
}

impl RedisAuditLog {
    /// Log to stream `key` over an existing connection
    pub fn from_connection(conn: ConnectionManager, key: impl Into<String>, retention: Duration) -> Self {
        let key = key.into();
        tracing::info!(stream = %key, retention_secs = retention.as_secs(), "Audit log on Redis stream");
        Self {
            conn,
            key,
            retention,
        }
    }
}

#[async_trait]
impl AuditLog for RedisAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<String> {
        let mut conn = self.conn.clone();
        let threshold = min_id_threshold(now_millis(), self.retention);

        let mut cmd = ::redis::cmd("XADD");
        cmd.arg(&self.key).arg("MINID").arg(threshold).arg("*");
        for (field, value) in record.fields() {
            cmd.arg(field).arg(value);
        }

        let id: String = cmd.query_async(&mut conn).await?;
        Ok(id)
    }

    async fn read_all(&self) -> Result<Vec<StoredRecord>> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn.xrevrange_all(&self.key).await?;

        Ok(reply
            .ids
            .into_iter()
            .map(|entry| {
                let fields: BTreeMap<String, String> = entry
                    .map
                    .iter()
                    .filter_map(|(k, v)| {
                        ::redis::from_redis_value::<String>(v)
                            .ok()
                            .map(|s| (k.clone(), s))
                    })
                    .collect();
                StoredRecord {
                    id: entry.id,
                    fields,
                }
            })
            .collect())
    }

    fn retention(&self) -> Duration {
        self.retention
    }
}
