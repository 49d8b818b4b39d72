//! In-memory audit log for development and testing

use super::{min_id_threshold, now_millis, AuditLog, AuditRecord, StoredRecord, DEFAULT_RETENTION};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EntryId {
    millis: u64,
    seq: u64,
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

/// Audit log kept in a `Vec`, ids shaped like stream ids (`<millis>-<seq>`)
pub struct MemoryAuditLog {
    entries: RwLock<Vec<(EntryId, BTreeMap<String, String>)>>,
    retention: Duration,
}

impl MemoryAuditLog {
    /// Create a log with the given retention window
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            retention,
        }
    }

    /// Number of retained entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn append_at(&self, now_ms: u64, record: &AuditRecord) -> String {
        let mut entries = self.entries.write().await;

        let id = match entries.last() {
            Some((last, _)) if last.millis >= now_ms => EntryId {
                millis: last.millis,
                seq: last.seq + 1,
            },
            _ => EntryId {
                millis: now_ms,
                seq: 0,
            },
        };
        entries.push((id, record.fields().clone()));

        let threshold = min_id_threshold(now_ms, self.retention);
        entries.retain(|(id, _)| id.millis >= threshold);

        id.to_string()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<String> {
        Ok(self.append_at(now_millis(), record).await)
    }

    async fn read_all(&self) -> Result<Vec<StoredRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .map(|(id, fields)| StoredRecord {
                id: id.to_string(),
                fields: fields.clone(),
            })
            .collect())
    }

    fn retention(&self) -> Duration {
        self.retention
    }
}
