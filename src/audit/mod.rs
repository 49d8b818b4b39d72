//! Append-only, retention-bounded history of publish attempts
//!
//! Every publish attempt writes one flat string map. The log trims entries
//! older than the retention window on each append, using a minimum-id
//! threshold of `now - retention` (stream ids start with a millisecond
//! timestamp).
//!
//! Reading is forward-compatible: record shapes the read path does not
//! recognize are returned as opaque maps, well-known shapes are re-projected
//! into [`AuditView`] for presentation.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryAuditLog;
pub use self::redis::RedisAuditLog;

use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default retention window (30 days)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

/// One flat audit entry as written to the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditRecord {
    fields: BTreeMap<String, String>,
}

impl AuditRecord {
    /// Record for one publish attempt of `event`
    pub fn from_event(event: &Event, publish_success: bool) -> Self {
        let mut record = Self::default();
        record.insert("id", &event.id);
        record.insert("name", &event.name);
        record.insert(
            "timestamp",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        record.insert("payload", event.payload.to_string());
        record.insert("source", &event.source);
        record.insert("sourceId", &event.source_id);
        record.insert("correlationId", &event.correlation_id);
        record.insert("hubName", &event.hub_name);
        record.insert("publishSuccess", publish_success.to_string());
        record
    }

    /// Add or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl From<BTreeMap<String, String>> for AuditRecord {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

/// An audit record as read back, with its log-assigned id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Log id (`<millis>-<seq>`)
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

/// Trait for audit sinks
///
/// The log is hub-independent; the hub is a field of each record.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append a record and trim entries older than the retention window
    ///
    /// Returns the id assigned to the new entry.
    async fn append(&self, record: &AuditRecord) -> Result<String>;

    /// All retained records, newest first
    async fn read_all(&self) -> Result<Vec<StoredRecord>>;

    /// Configured retention window
    fn retention(&self) -> Duration;
}

/// Minimum id (milliseconds) an entry needs to survive trimming at `now_ms`
pub fn min_id_threshold(now_ms: u64, retention: Duration) -> u64 {
    now_ms.saturating_sub(u64::try_from(retention.as_millis()).unwrap_or(u64::MAX))
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// ============================================================================
// Read-side view
// ============================================================================

/// Well-known record shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    CollectorRestart,
    VariableUpdated,
    EventTriggered,
}

impl AuditKind {
    /// Identify a record's shape; `None` for unknown or legacy records
    pub fn classify(fields: &BTreeMap<String, String>) -> Option<Self> {
        if let Some(kind) = fields.get("type") {
            return match kind.as_str() {
                "collector_restart" => Some(AuditKind::CollectorRestart),
                "variable_updated" => Some(AuditKind::VariableUpdated),
                "event_triggered" => Some(AuditKind::EventTriggered),
                _ => None,
            };
        }

        let is_publish_record = ["id", "name", "hubName", "publishSuccess"]
            .iter()
            .all(|k| fields.contains_key(*k));
        if !is_publish_record {
            return None;
        }

        if fields.get("name").is_some_and(|n| n.starts_with("var.")) {
            Some(AuditKind::VariableUpdated)
        } else {
            Some(AuditKind::EventTriggered)
        }
    }
}

/// Event identity section of a projected record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventView {
    pub id: String,
    pub name: String,
    pub source_id: String,
    pub correlation_id: String,
}

/// What caused the record
#[derive(Debug, Clone, Serialize)]
pub struct AuditTriggerView {
    /// "alert", "api", "agent" or "event"
    pub kind: String,
    pub source: String,
}

/// Where the record applies
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContextView {
    pub hub_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_id: Option<String>,
}

/// Presentation form of a well-known record
#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AuditKind,
    pub timestamp: String,
    pub event: AuditEventView,
    pub trigger: AuditTriggerView,
    pub context: AuditContextView,
    pub payload: serde_json::Value,
}

/// Opaque record passed through unchanged
#[derive(Debug, Clone, Serialize)]
pub struct RawAuditEntry {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// One entry of the audit endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditEntry {
    Projected(AuditView),
    Raw(RawAuditEntry),
}

impl AuditEntry {
    /// Re-project a stored record for presentation
    pub fn project(record: StoredRecord) -> Self {
        let Some(kind) = AuditKind::classify(&record.fields) else {
            return AuditEntry::Raw(RawAuditEntry {
                id: record.id,
                fields: record.fields,
            });
        };

        let field = |k: &str| record.fields.get(k).cloned().unwrap_or_default();
        let optional = |k: &str| record.fields.get(k).filter(|v| !v.is_empty()).cloned();

        let source = match kind {
            AuditKind::CollectorRestart => optional("source").unwrap_or_else(|| "agent".to_string()),
            _ => field("source"),
        };
        let trigger_kind = match (kind, source.as_str()) {
            (AuditKind::CollectorRestart, _) | (_, "buffer-replay") => "agent",
            (_, "prometheus") => "alert",
            (_, "manual_variables_api") => "api",
            _ => "event",
        };

        let payload = record
            .fields
            .get("payload")
            .map(|p| serde_json::from_str(p).unwrap_or_else(|_| serde_json::Value::String(p.clone())))
            .unwrap_or(serde_json::Value::Null);

        AuditEntry::Projected(AuditView {
            kind,
            timestamp: field("timestamp"),
            event: AuditEventView {
                id: field("id"),
                name: field("name"),
                source_id: field("sourceId"),
                correlation_id: field("correlationId"),
            },
            trigger: AuditTriggerView {
                kind: trigger_kind.to_string(),
                source,
            },
            context: AuditContextView {
                hub_name: field("hubName"),
                publish_success: record.fields.get("publishSuccess").and_then(|v| v.parse().ok()),
                instance_id: optional("instanceId"),
                replay_id: optional("replayId"),
            },
            payload,
            id: record.id,
        })
    }
}
