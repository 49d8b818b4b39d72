//! Source adapters: inbound payloads to canonical events
//!
//! The HTTP boundary sniffs the request body's top-level keys to decide
//! which adapter runs. The set of shapes is fixed: Prometheus Alertmanager
//! webhooks and native events.

pub mod native;
pub mod prometheus;

pub use native::NativeAdapter;
pub use prometheus::{Alert, AlertBatch, PrometheusAdapter};

use crate::error::{IngestError, Result};

/// Which adapter a request body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Alertmanager webhook (`receiver` + `alerts`)
    Prometheus,
    /// Native event (`name` + `payload`)
    NativeEvent,
    /// Neither shape
    Unrecognized,
}

impl PayloadKind {
    /// Structural key-presence check; Prometheus wins when both shapes match
    pub fn detect(body: &serde_json::Value) -> Self {
        let Some(obj) = body.as_object() else {
            return PayloadKind::Unrecognized;
        };

        if obj.contains_key("receiver") && obj.contains_key("alerts") {
            PayloadKind::Prometheus
        } else if obj.contains_key("name") && obj.contains_key("payload") {
            PayloadKind::NativeEvent
        } else {
            PayloadKind::Unrecognized
        }
    }
}

/// A request body resolved to its adapter input
#[derive(Debug, Clone)]
pub enum Inbound {
    Alerts(AlertBatch),
    Event(crate::types::Event),
}

impl Inbound {
    /// Detect the shape of `body` and deserialize it into the matching input
    pub fn from_json(body: serde_json::Value) -> Result<Self> {
        match PayloadKind::detect(&body) {
            PayloadKind::Prometheus => serde_json::from_value(body)
                .map(Inbound::Alerts)
                .map_err(|e| IngestError::Format(format!("invalid Alertmanager payload: {}", e))),
            PayloadKind::NativeEvent => serde_json::from_value(body)
                .map(Inbound::Event)
                .map_err(|e| IngestError::Format(format!("invalid event: {}", e))),
            PayloadKind::Unrecognized => Err(IngestError::Format(
                "expected an Alertmanager webhook or an event with 'name' and 'payload'"
                    .to_string(),
            )),
        }
    }
}
