//! Publisher/audit façade
//!
//! Fans canonical events out to the bus in order, writes one audit record per
//! attempt, and accounts for partial failure. Audit writes never fail a
//! publish. Cancellation or an expired deadline stops the batch; events
//! already published stay published.

use crate::audit::{AuditLog, AuditRecord};
use crate::error::{IngestError, Result};
use crate::provider::EventProvider;
use crate::types::Event;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline for one publish batch
#[derive(Debug, Clone, Default)]
pub struct PublishContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl PublishContext {
    /// Never cancelled, no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Context tied to an existing token
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run `fut`, losing to cancellation or the deadline
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IngestError::Cancelled(what.to_string())),
            _ = deadline => Err(IngestError::Timeout(what.to_string())),
            result = fut => result,
        }
    }
}

/// Outcome of a publish batch
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Events handed to the publisher
    pub total: usize,
    /// Events the bus accepted
    pub successful: usize,
    /// Joined failures, `None` when every attempted publish succeeded
    pub error: Option<IngestError>,
}

impl PublishReport {
    /// Events not published, including those never attempted
    pub fn failed(&self) -> usize {
        self.total - self.successful
    }

    pub fn is_complete(&self) -> bool {
        self.successful == self.total && self.error.is_none()
    }

    /// First error for single-event callers
    pub fn into_result(self) -> Result<usize> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.successful),
        }
    }
}

/// Publishes events to the bus and audits every attempt
pub struct Publisher {
    provider: Arc<dyn EventProvider>,
    audit: Arc<dyn AuditLog>,
}

impl Publisher {
    pub fn new(provider: Arc<dyn EventProvider>, audit: Arc<dyn AuditLog>) -> Self {
        Self { provider, audit }
    }

    pub fn provider(&self) -> &dyn EventProvider {
        self.provider.as_ref()
    }

    pub fn audit(&self) -> &dyn AuditLog {
        self.audit.as_ref()
    }

    /// Publish events to their default `<prefix>.<hub>.<name>` subjects
    pub async fn publish_events(&self, ctx: &PublishContext, events: Vec<Event>) -> PublishReport {
        let routed = events
            .into_iter()
            .map(|event| {
                let subject = self.provider.build_subject(&event.hub_name, &event.name);
                (subject, event)
            })
            .collect();
        self.publish_routed(ctx, routed).await
    }

    /// Publish events to explicit subjects, in order
    pub async fn publish_routed(
        &self,
        ctx: &PublishContext,
        events: Vec<(String, Event)>,
    ) -> PublishReport {
        let mut report = PublishReport {
            total: events.len(),
            ..Default::default()
        };
        let mut errors = Vec::new();

        for (subject, event) in events {
            let result = ctx
                .run(&subject, self.provider.publish(&subject, &event))
                .await;

            self.record(AuditRecord::from_event(&event, result.is_ok()))
                .await;

            match result {
                Ok(sequence) => {
                    report.successful += 1;
                    tracing::info!(
                        event_id = %event.id,
                        subject = %subject,
                        hub = %event.hub_name,
                        sequence,
                        "Event published"
                    );
                }
                Err(e) => {
                    tracing::warn!(event_id = %event.id, subject = %subject, error = %e, "Publish failed");
                    let stop = e.is_cancellation();
                    errors.push(e);
                    if stop {
                        break;
                    }
                }
            }
        }

        report.error = IngestError::join(errors);
        report
    }

    /// Append an audit record, logging instead of returning failures
    pub async fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.append(&record).await {
            tracing::warn!(
                event_id = record.get("id").unwrap_or_default(),
                error = %e,
                "Audit write failed"
            );
        }
    }
}
