//! Agent registry and replay-completion detector
//!
//! Tracks connected collector agents by connection id. The first frame that
//! describes an agent yields its `AgentRecord`; log records reported later
//! with an `ingest_status` of `completed` or `failed` become
//! `replay-complete` events on `replay.<hub>.<status>`.

pub mod protocol;

pub use protocol::{AgentToServer, ServerToAgent};

use crate::audit::AuditRecord;
use crate::provider::subject_token;
use crate::publisher::{PublishContext, Publisher};
use crate::types::Event;
use chrono::{DateTime, SecondsFormat, Utc};
use protocol::attribute;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Source tag for replay-completion events
pub const SOURCE: &str = "buffer-replay";

/// Name of replay-completion events
pub const REPLAY_COMPLETE: &str = "replay-complete";

const INSTANCE_ID: &str = "instance_id";
const REPLAY_ID: &str = "replay_id";
const HUB_NAME: &str = "hub_name";
const INGEST_STATUS: &str = "ingest_status";

/// What the registry knows about one agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub instance_id: String,
    pub replay_id: String,
    pub hub_name: String,
}

impl AgentRecord {
    /// Harvest a record from an agent description
    ///
    /// `None` unless `instance_id` (identifying) and both `replay_id` and
    /// `hub_name` (non-identifying) are present. Other attributes are ignored.
    pub fn harvest(msg: &AgentToServer) -> Option<Self> {
        let desc = msg.agent_description.as_ref()?;
        Some(Self {
            instance_id: attribute(&desc.identifying_attributes, INSTANCE_ID)?,
            replay_id: attribute(&desc.non_identifying_attributes, REPLAY_ID)?,
            hub_name: attribute(&desc.non_identifying_attributes, HUB_NAME)?,
        })
    }
}

/// Terminal replay status reported by a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    Completed,
    Failed,
}

impl ReplayStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "completed" => Some(ReplayStatus::Completed),
            "failed" => Some(ReplayStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayStatus::Completed => "completed",
            ReplayStatus::Failed => "failed",
        }
    }
}

/// Subject replay events for `hub` are routed to
pub fn replay_subject(hub: &str, status: ReplayStatus) -> String {
    format!("replay.{}.{}", subject_token(hub, false), status.as_str())
}

/// Build the `replay-complete` event for `agent`
pub fn replay_event(agent: &AgentRecord, status: ReplayStatus) -> Event {
    let payload = serde_json::json!({
        "replay_id": agent.replay_id,
        "replay_result": status.as_str(),
        "replayer_instance_id": agent.instance_id,
    });
    Event::new(REPLAY_COMPLETE, SOURCE, &agent.hub_name, payload).with_source_id(&agent.instance_id)
}

struct Connection {
    cancel: CancellationToken,
    connected_at: DateTime<Utc>,
    instance_uid: String,
}

/// One row of the agent listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub connection_id: String,
    pub instance_uid: String,
    pub connected_at: DateTime<Utc>,
    pub record: Option<AgentRecord>,
}

/// Registry of connected agents
pub struct AgentRegistry {
    agents: Mutex<HashMap<String, AgentRecord>>,
    connections: Mutex<HashMap<String, Connection>>,
    publisher: Arc<Publisher>,
    shutdown: CancellationToken,
}

impl AgentRegistry {
    pub fn new(publisher: Arc<Publisher>) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            publisher,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a connection
    ///
    /// The token is cancelled when the connection closes or the registry
    /// shuts down.
    pub fn on_connected(&self, connection_id: &str) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                connection_id.to_string(),
                Connection {
                    cancel: cancel.clone(),
                    connected_at: Utc::now(),
                    instance_uid: String::new(),
                },
            );
        tracing::info!(connection_id, "Agent connected");
        cancel
    }

    /// Handle one frame from an agent
    pub async fn on_message(&self, connection_id: &str, msg: &AgentToServer) -> ServerToAgent {
        let cancel = {
            let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
            connections.get_mut(connection_id).map(|conn| {
                if conn.instance_uid.is_empty() {
                    conn.instance_uid = msg.instance_uid.clone();
                }
                conn.cancel.clone()
            })
        };
        let Some(cancel) = cancel else {
            tracing::warn!(connection_id, "Frame from unregistered connection");
            return ServerToAgent {
                instance_uid: msg.instance_uid.clone(),
            };
        };

        if let Some(harvested) = self.harvest(connection_id, msg) {
            self.publisher
                .record(
                    AuditRecord::default()
                        .with("type", "collector_restart")
                        .with("instanceId", &harvested.instance_id)
                        .with("replayId", &harvested.replay_id)
                        .with("hubName", &harvested.hub_name)
                        .with("timestamp", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                )
                .await;
        }

        if let Some(custom) = &msg.custom_message {
            match custom.logs() {
                Some(Ok(logs)) => {
                    let statuses: Vec<ReplayStatus> = logs
                        .records()
                        .filter_map(|r| attribute(&r.attributes, INGEST_STATUS))
                        .filter_map(|s| ReplayStatus::parse(&s))
                        .collect();
                    if !statuses.is_empty() {
                        self.publish_replays(connection_id, &cancel, statuses).await;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(connection_id, error = %e, "Undecodable agent logs");
                }
                None => {}
            }
        }

        ServerToAgent {
            instance_uid: msg.instance_uid.clone(),
        }
    }

    /// Forget a connection and cancel its in-flight work
    pub fn on_connection_close(&self, connection_id: &str) {
        let conn = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id);
        let record = self
            .agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id);

        if let Some(conn) = conn {
            conn.cancel.cancel();
        }
        tracing::info!(
            connection_id,
            instance_id = record.as_ref().map(|r| r.instance_id.as_str()).unwrap_or(""),
            "Agent disconnected"
        );
    }

    /// Cancel every connection's token
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Harvested record for a connection
    pub fn get(&self, connection_id: &str) -> Option<AgentRecord> {
        self.agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    /// Connected agents, oldest connection first
    pub fn list(&self) -> Vec<AgentSummary> {
        let rows: Vec<(String, String, DateTime<Utc>)> = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, conn)| (id.clone(), conn.instance_uid.clone(), conn.connected_at))
            .collect();

        let agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<AgentSummary> = rows
            .into_iter()
            .map(|(connection_id, instance_uid, connected_at)| AgentSummary {
                record: agents.get(&connection_id).cloned(),
                connection_id,
                instance_uid,
                connected_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        summaries
    }

    pub fn len(&self) -> usize {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a newly harvested record; `None` if already known or not found
    fn harvest(&self, connection_id: &str, msg: &AgentToServer) -> Option<AgentRecord> {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        if agents.contains_key(connection_id) {
            return None;
        }

        match AgentRecord::harvest(msg) {
            Some(record) => {
                tracing::info!(
                    connection_id,
                    instance_id = %record.instance_id,
                    replay_id = %record.replay_id,
                    hub = %record.hub_name,
                    "Agent identified"
                );
                agents.insert(connection_id.to_string(), record.clone());
                Some(record)
            }
            None => {
                if msg.agent_description.is_some() {
                    tracing::debug!(connection_id, "Agent attributes not found");
                }
                None
            }
        }
    }

    async fn publish_replays(
        &self,
        connection_id: &str,
        cancel: &CancellationToken,
        statuses: Vec<ReplayStatus>,
    ) {
        let Some(agent) = self.get(connection_id) else {
            tracing::warn!(connection_id, "Replay status from unidentified agent");
            return;
        };

        let routed = statuses
            .into_iter()
            .map(|status| (replay_subject(&agent.hub_name, status), replay_event(&agent, status)))
            .collect();

        let ctx = PublishContext::new(cancel.clone());
        let report = self.publisher.publish_routed(&ctx, routed).await;
        if let Some(e) = report.error {
            tracing::warn!(
                connection_id,
                successful = report.successful,
                total = report.total,
                error = %e,
                "Replay events not fully published"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::protocol::{AgentDescription, CustomMessage, KeyValue};
    use super::*;
    use crate::audit::{AuditLog, MemoryAuditLog};
    use crate::provider::memory::MemoryProvider;

    fn described(identifying: Vec<KeyValue>, non_identifying: Vec<KeyValue>) -> AgentToServer {
        AgentToServer {
            instance_uid: "uid-1".to_string(),
            agent_description: Some(AgentDescription {
                identifying_attributes: identifying,
                non_identifying_attributes: non_identifying,
            }),
            ..Default::default()
        }
    }

    fn full_description() -> AgentToServer {
        described(
            vec![
                KeyValue::string("instance_id", "otel-1"),
                KeyValue::string("service.name", "collector"),
            ],
            vec![
                KeyValue::string("replay_id", "r-42"),
                KeyValue::string("hub_name", "ops"),
                KeyValue::string("os.type", "linux"),
            ],
        )
    }

    fn logs_message(statuses: &[&str]) -> AgentToServer {
        let records: Vec<serde_json::Value> = statuses
            .iter()
            .map(|s| serde_json::json!({"attributes": [{"key": "ingest_status", "value": {"stringValue": s}}]}))
            .collect();
        let logs = serde_json::json!({"resourceLogs": [{"scopeLogs": [{"logRecords": records}]}]});
        AgentToServer {
            instance_uid: "uid-1".to_string(),
            custom_message: Some(CustomMessage {
                capability: "io.a3s.replay".to_string(),
                kind: "otlp.logs".to_string(),
                data: logs.to_string().into_bytes(),
            }),
            ..Default::default()
        }
    }

    fn registry() -> (AgentRegistry, Arc<MemoryProvider>, Arc<MemoryAuditLog>) {
        let provider = Arc::new(MemoryProvider::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let publisher = Arc::new(Publisher::new(provider.clone(), audit.clone()));
        (AgentRegistry::new(publisher), provider, audit)
    }

    #[test]
    fn test_harvest_found_with_extraneous_attributes() {
        let record = AgentRecord::harvest(&full_description()).unwrap();
        assert_eq!(
            record,
            AgentRecord {
                instance_id: "otel-1".to_string(),
                replay_id: "r-42".to_string(),
                hub_name: "ops".to_string(),
            }
        );
    }

    #[test]
    fn test_harvest_not_found() {
        let no_identity = described(vec![], vec![KeyValue::string("replay_id", "r-42")]);
        assert!(AgentRecord::harvest(&no_identity).is_none());

        let missing_hub = described(
            vec![KeyValue::string("instance_id", "otel-1")],
            vec![KeyValue::string("replay_id", "r-42")],
        );
        assert!(AgentRecord::harvest(&missing_hub).is_none());

        assert!(AgentRecord::harvest(&AgentToServer::default()).is_none());
    }

    #[tokio::test]
    async fn test_first_contact_audits_collector_restart() {
        let (registry, _, audit) = registry();
        registry.on_connected("c1");

        let reply = registry.on_message("c1", &full_description()).await;
        assert_eq!(reply.instance_uid, "uid-1");
        registry.on_message("c1", &full_description()).await;

        assert_eq!(registry.get("c1").unwrap().instance_id, "otel-1");
        let records = audit.read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["type"], "collector_restart");
        assert_eq!(records[0].fields["replayId"], "r-42");
    }

    #[tokio::test]
    async fn test_replay_status_publishes_events() {
        let (registry, provider, _) = registry();
        registry.on_connected("c1");
        registry.on_message("c1", &full_description()).await;

        registry
            .on_message("c1", &logs_message(&["completed", "running", "failed", "completed"]))
            .await;

        let published = provider.published_on("replay.").await;
        let subjects: Vec<&str> = published.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(
            subjects,
            vec!["replay.ops.completed", "replay.ops.failed", "replay.ops.completed"]
        );

        let event = &published[1].event;
        assert_eq!(event.name, "replay-complete");
        assert_eq!(event.source, "buffer-replay");
        assert_eq!(event.source_id, "otel-1");
        assert_eq!(event.payload["replay_id"], "r-42");
        assert_eq!(event.payload["replay_result"], "failed");
        assert_eq!(event.payload["replayer_instance_id"], "otel-1");
    }

    #[tokio::test]
    async fn test_logs_from_unidentified_agent_are_ignored() {
        let (registry, provider, _) = registry();
        registry.on_connected("c1");
        registry.on_message("c1", &logs_message(&["completed"])).await;
        assert!(provider.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_cancels_and_removes() {
        let (registry, _, _) = registry();
        let token = registry.on_connected("c1");
        registry.on_message("c1", &full_description()).await;
        assert_eq!(registry.list().len(), 1);
        assert!(registry.list()[0].record.is_some());

        registry.on_connection_close("c1");
        assert!(token.is_cancelled());
        assert!(registry.is_empty());
        assert!(registry.get("c1").is_none());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_all_connections() {
        let (registry, _, _) = registry();
        let a = registry.on_connected("a");
        let b = registry.on_connected("b");
        registry.shutdown();
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
