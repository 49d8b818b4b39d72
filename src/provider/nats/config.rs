//! NATS provider configuration

use crate::provider::subject_token;
use serde::{Deserialize, Serialize};

/// JetStream storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    File,
    Memory,
}

/// Configuration for the NATS JetStream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsConfig {
    /// Server URL (default: nats://127.0.0.1:4222)
    pub url: String,

    /// Optional auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// JetStream stream name
    pub stream_name: String,

    /// Prefix for canonical event subjects: `<prefix>.<hub>.<name>`
    pub subject_prefix: String,

    /// Extra subject filters the stream captures (e.g., replay completions)
    #[serde(default)]
    pub extra_subjects: Vec<String>,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageType,

    /// Maximum messages retained by the stream (-1 = unlimited)
    pub max_events: i64,

    /// Maximum message age in seconds (0 = unlimited)
    pub max_age_secs: u64,

    /// Maximum stream size in bytes (-1 = unlimited)
    pub max_bytes: i64,

    /// Broker-side duplicate window in seconds, keyed by `Nats-Msg-Id`
    pub duplicate_window_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Request/ack timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            token: None,
            stream_name: "HUB_EVENTS".to_string(),
            subject_prefix: "events".to_string(),
            extra_subjects: vec!["replay.>".to_string()],
            storage: StorageType::File,
            max_events: -1,
            max_age_secs: 7 * 24 * 3600,
            max_bytes: -1,
            duplicate_window_secs: 120,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl NatsConfig {
    /// Subject for an event: `<prefix>.<hub>.<name>`
    pub fn build_subject(&self, hub: &str, name: &str) -> String {
        format!(
            "{}.{}.{}",
            self.subject_prefix,
            subject_token(hub, false),
            subject_token(name, true)
        )
    }

    /// Subjects captured by the stream
    pub fn stream_subjects(&self) -> Vec<String> {
        let mut subjects = vec![format!("{}.>", self.subject_prefix)];
        subjects.extend(self.extra_subjects.iter().cloned());
        subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.stream_name, "HUB_EVENTS");
        assert_eq!(
            config.stream_subjects(),
            vec!["events.>".to_string(), "replay.>".to_string()]
        );
    }

    #[test]
    fn test_build_subject() {
        let config = NatsConfig {
            subject_prefix: "hubs".to_string(),
            ..Default::default()
        };
        assert_eq!(config.build_subject("ops", "var.add"), "hubs.ops.var.add");
    }
}
