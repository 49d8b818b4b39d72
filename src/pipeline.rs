//! Ingestion pipeline: adapter → deduplicator → publisher
//!
//! Alerts pass the deduplicator before publishing; native events are
//! published as submitted.

use crate::adapter::{AlertBatch, Inbound, NativeAdapter, PrometheusAdapter};
use crate::dedup::Deduplicator;
use crate::error::Result;
use crate::publisher::{PublishContext, PublishReport, Publisher};
use crate::types::Event;
use std::sync::Arc;

/// Which adapter produced a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Prometheus,
    Native,
}

/// A processed request body
#[derive(Debug)]
pub struct IngestOutcome {
    pub source: IngestSource,
    pub report: PublishReport,
}

/// Runs inbound payloads through the pipeline
pub struct Ingestor {
    dedup: Arc<Deduplicator>,
    publisher: Arc<Publisher>,
}

impl Ingestor {
    pub fn new(dedup: Arc<Deduplicator>, publisher: Arc<Publisher>) -> Self {
        Self { dedup, publisher }
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    /// Detect the body's shape and ingest it
    pub async fn ingest(&self, ctx: &PublishContext, body: serde_json::Value) -> Result<IngestOutcome> {
        match Inbound::from_json(body)? {
            Inbound::Alerts(batch) => Ok(IngestOutcome {
                source: IngestSource::Prometheus,
                report: self.ingest_alerts(ctx, &batch).await?,
            }),
            Inbound::Event(event) => Ok(IngestOutcome {
                source: IngestSource::Native,
                report: self.ingest_event(ctx, event).await?,
            }),
        }
    }

    /// Convert, deduplicate and publish an Alertmanager batch
    ///
    /// `total` in the report counts only alerts that passed deduplication.
    pub async fn ingest_alerts(&self, ctx: &PublishContext, batch: &AlertBatch) -> Result<PublishReport> {
        let converted = PrometheusAdapter::convert_keyed(batch)?;
        let received = converted.len();

        // Gate on the delivered start time; a defaulted event timestamp would
        // make every redelivery of an unset start look newer
        let fresh: Vec<Event> = converted
            .into_iter()
            .filter_map(|(starts_at, event)| {
                if self.dedup.is_newer(&event.source_id, starts_at) {
                    Some(event)
                } else {
                    tracing::debug!(
                        source_id = %event.source_id,
                        name = %event.name,
                        starts_at = %starts_at,
                        "Dropping duplicate alert"
                    );
                    None
                }
            })
            .collect();

        tracing::debug!(
            receiver = %batch.receiver,
            received,
            fresh = fresh.len(),
            "Alert batch converted"
        );

        Ok(self.publisher.publish_events(ctx, fresh).await)
    }

    /// Default, validate and publish one native event
    pub async fn ingest_event(&self, ctx: &PublishContext, event: Event) -> Result<PublishReport> {
        let event = NativeAdapter::convert(event)?;
        Ok(self.publisher.publish_events(ctx, vec![event]).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, MemoryAuditLog};
    use crate::error::IngestError;
    use crate::provider::memory::MemoryProvider;
    use serde_json::json;

    fn ingestor() -> (Ingestor, Arc<MemoryProvider>, Arc<MemoryAuditLog>) {
        let provider = Arc::new(MemoryProvider::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let publisher = Arc::new(Publisher::new(provider.clone(), audit.clone()));
        (
            Ingestor::new(Arc::new(Deduplicator::default()), publisher),
            provider,
            audit,
        )
    }

    fn alert(fingerprint: &str, starts_at: &str) -> serde_json::Value {
        json!({
            "status": "firing",
            "labels": {"instance": "db-1"},
            "annotations": {"alert_name": "HighCpu", "hub_name": "ops", "current_value": "97"},
            "startsAt": starts_at,
            "fingerprint": fingerprint
        })
    }

    fn batch(alerts: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"receiver": "hub", "status": "firing", "alerts": alerts})
    }

    #[tokio::test]
    async fn test_duplicate_alerts_are_dropped() {
        let (ingestor, provider, _) = ingestor();
        let ctx = PublishContext::background();

        let body = batch(vec![
            alert("fp-1", "2024-03-01T10:00:00Z"),
            alert("fp-2", "2024-03-01T09:00:00Z"),
        ]);
        let outcome = ingestor.ingest(&ctx, body.clone()).await.unwrap();
        assert_eq!(outcome.source, IngestSource::Prometheus);
        assert_eq!(outcome.report.total, 2);
        assert_eq!(outcome.report.successful, 2);

        let repeat = ingestor.ingest(&ctx, body).await.unwrap();
        assert_eq!(repeat.report.total, 0);
        assert_eq!(provider.published().await.len(), 2);

        let published = provider.published().await;
        assert_eq!(published[0].event.source_id, "fp-2");
        assert_eq!(published[0].subject, "events.ops.HighCpu.firing");
    }

    #[tokio::test]
    async fn test_alert_without_start_time_published_once() {
        let (ingestor, provider, _) = ingestor();
        let ctx = PublishContext::background();
        let body = batch(vec![json!({
            "status": "firing",
            "annotations": {"alert_name": "NodeDown", "hub_name": "ops"},
            "fingerprint": "fp-zero"
        })]);

        let first = ingestor.ingest(&ctx, body.clone()).await.unwrap();
        assert_eq!(first.report.total, 1);
        assert_eq!(first.report.successful, 1);

        let second = ingestor.ingest(&ctx, body).await.unwrap();
        assert_eq!(second.report.total, 0);

        let published = provider.published().await;
        assert_eq!(published.len(), 1);
        assert!(published[0].event.timestamp.timestamp() > 0);
    }

    #[tokio::test]
    async fn test_native_event_flow() {
        let (ingestor, provider, audit) = ingestor();
        let ctx = PublishContext::background();

        let outcome = ingestor
            .ingest(&ctx, json!({"name": "deploy.done", "hubName": "ops", "payload": {"v": 2}}))
            .await
            .unwrap();
        assert_eq!(outcome.source, IngestSource::Native);
        assert!(outcome.report.is_complete());

        let published = provider.published().await;
        assert!(published[0].event.id.starts_with("evt-"));
        assert_eq!(audit.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_native_event() {
        let (ingestor, provider, _) = ingestor();
        let err = ingestor
            .ingest(
                &PublishContext::background(),
                json!({"name": "deploy.done", "payload": {"v": 2}}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation { field: "hubName" }));
        assert!(provider.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_body() {
        let (ingestor, _, _) = ingestor();
        let err = ingestor
            .ingest(&PublishContext::background(), json!({"foo": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Format(_)));
    }
}
