//! Canonical event model
//!
//! Every inbound source is normalized into [`Event`] before it reaches the
//! publisher. All types use camelCase JSON serialization for wire compatibility.

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single normalized unit flowing through the pipeline
///
/// Events are created by an adapter or the variable command system and are
/// never mutated once defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier (evt-<uuid>)
    #[serde(default)]
    pub id: String,

    /// Dot-qualified action or status (e.g., "HighCpu.firing", "var.add")
    #[serde(default)]
    pub name: String,

    /// Origin tag (e.g., "prometheus", "manual_variables_api")
    #[serde(default)]
    pub source: String,

    /// Upstream deduplication key, such as an alert fingerprint
    #[serde(default)]
    pub source_id: String,

    /// Stable across retries of the same logical action
    #[serde(default)]
    pub correlation_id: String,

    /// Tenant the event belongs to
    #[serde(default)]
    pub hub_name: String,

    /// When the event happened; zero means "now" after defaulting
    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    /// Source-defined payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a defaulted event
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        hub_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let mut event = Self {
            id: String::new(),
            name: name.into(),
            source: source.into(),
            source_id: String::new(),
            correlation_id: String::new(),
            hub_name: hub_name.into(),
            timestamp: DateTime::<Utc>::default(),
            payload,
        };
        event.apply_defaults();
        event
    }

    /// Set the upstream deduplication key
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Set the event time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self.apply_defaults();
        self
    }

    /// Fill `id`, `correlation_id` and `timestamp` when unset
    ///
    /// Idempotent: present values are never overwritten.
    pub fn apply_defaults(&mut self) {
        if self.id.is_empty() {
            self.id = format!("evt-{}", uuid::Uuid::new_v4());
        }
        if self.correlation_id.is_empty() {
            self.correlation_id = uuid::Uuid::new_v4().to_string();
        }
        if is_zero_time(&self.timestamp) {
            self.timestamp = Utc::now();
        }
    }

    /// Check the fields a directly-submitted event must carry
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(IngestError::Validation { field: "name" });
        }
        if self.hub_name.is_empty() {
            return Err(IngestError::Validation { field: "hubName" });
        }
        if is_empty_payload(&self.payload) {
            return Err(IngestError::Validation { field: "payload" });
        }
        Ok(())
    }
}

/// Timestamps at or before the Unix epoch count as unset
pub fn is_zero_time(timestamp: &DateTime<Utc>) -> bool {
    timestamp.timestamp_millis() <= 0
}

fn is_empty_payload(payload: &serde_json::Value) -> bool {
    match payload {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
