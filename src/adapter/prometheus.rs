//! Prometheus Alertmanager webhook adapter

use crate::error::Result;
use crate::types::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source tag for alert-derived events
pub const SOURCE: &str = "prometheus";

/// Annotation holding the automation-facing alert name
pub const ALERT_NAME_ANNOTATION: &str = "alert_name";

/// Annotation holding the target hub
pub const HUB_NAME_ANNOTATION: &str = "hub_name";

/// Annotation holding the sampled metric value
pub const CURRENT_VALUE_ANNOTATION: &str = "current_value";

/// Alertmanager webhook body (version 4)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    pub receiver: String,

    #[serde(default)]
    pub status: String,

    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,

    #[serde(default, rename = "externalURL")]
    pub external_url: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub group_key: String,

    #[serde(default)]
    pub truncated_alerts: u64,
}

/// One alert instance within a webhook batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub starts_at: DateTime<Utc>,

    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,

    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    fn annotation(&self, key: &str) -> &str {
        self.annotations.get(key).map(String::as_str).unwrap_or("")
    }
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    #[serde(flatten)]
    labels: &'a BTreeMap<String, String>,
    value: &'a str,
    status: &'a str,
}

/// Converts Alertmanager batches into canonical events
pub struct PrometheusAdapter;

impl PrometheusAdapter {
    /// Convert a batch, ordered ascending by alert start time
    ///
    /// Alerts sharing a start time keep their delivery order (stable sort);
    /// that tie order carries no meaning downstream. A payload that fails to
    /// serialize aborts the whole batch.
    pub fn convert(batch: &AlertBatch) -> Result<Vec<Event>> {
        Ok(Self::convert_keyed(batch)?
            .into_iter()
            .map(|(_, event)| event)
            .collect())
    }

    /// Like [`convert`](Self::convert), pairing each event with the alert's
    /// `startsAt` as delivered
    ///
    /// A missing or zero start time is kept as-is here, while the event's
    /// own timestamp is defaulted to the conversion time.
    pub fn convert_keyed(batch: &AlertBatch) -> Result<Vec<(DateTime<Utc>, Event)>> {
        let mut alerts: Vec<&Alert> = batch.alerts.iter().collect();
        alerts.sort_by_key(|a| a.starts_at);

        alerts
            .into_iter()
            .map(|alert| Ok((alert.starts_at, Self::convert_alert(alert)?)))
            .collect()
    }

    fn convert_alert(alert: &Alert) -> Result<Event> {
        let payload = serde_json::to_value(AlertPayload {
            labels: &alert.labels,
            value: alert.annotation(CURRENT_VALUE_ANNOTATION),
            status: &alert.status,
        })?;

        // Without a fingerprint every delivery must look new to the deduplicator
        let source_id = if alert.fingerprint.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            alert.fingerprint.clone()
        };

        let mut event = Event {
            id: String::new(),
            name: format!("{}.{}", alert.annotation(ALERT_NAME_ANNOTATION), alert.status),
            source: SOURCE.to_string(),
            source_id,
            correlation_id: String::new(),
            hub_name: alert.annotation(HUB_NAME_ANNOTATION).to_string(),
            timestamp: alert.starts_at,
            payload,
        };
        event.apply_defaults();
        Ok(event)
    }
}
