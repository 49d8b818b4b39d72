use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::AgentRegistry;
use crate::error::{IngestError, Result};
use crate::kv::KeyValueStore;
use crate::pipeline::Ingestor;
use crate::publisher::{PublishContext, Publisher};
use crate::variables::VariableCatalog;

/// Shared application state accessible to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub publisher: Arc<Publisher>,
    pub kv: Arc<dyn KeyValueStore>,
    pub variables: Arc<dyn VariableCatalog>,
    pub agents: Arc<AgentRegistry>,
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        ingestor: Arc<Ingestor>,
        kv: Arc<dyn KeyValueStore>,
        variables: Arc<dyn VariableCatalog>,
        agents: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            publisher: ingestor.publisher().clone(),
            ingestor,
            kv,
            variables,
            agents,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Publish context for one request
    pub fn publish_context(&self) -> PublishContext {
        match self.request_timeout {
            Some(timeout) => PublishContext::background().with_timeout(timeout),
            None => PublishContext::background(),
        }
    }

    /// Run a request's publish work on its own task
    ///
    /// Dropping the returned future (the client went away) cancels the
    /// request's context rather than the work: the batch stops at the next
    /// event boundary and every attempted publish is still audited.
    pub async fn run_publish<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(PublishContext) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let ctx = self.publish_context();
        let guard = ctx.cancel_token().clone().drop_guard();

        let result = tokio::spawn(work(ctx))
            .await
            .map_err(|e| IngestError::Server(format!("publish task failed: {e}")))?;

        guard.disarm();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, AuditRecord, MemoryAuditLog, StoredRecord};
    use crate::dedup::Deduplicator;
    use crate::kv::MemoryKeyValueStore;
    use crate::provider::memory::MemoryProvider;
    use crate::types::Event;
    use crate::variables::DeclaredVariables;
    use async_trait::async_trait;

    /// Audit sink that takes a while to acknowledge each write
    struct SlowAuditLog {
        inner: MemoryAuditLog,
        delay: Duration,
    }

    #[async_trait]
    impl AuditLog for SlowAuditLog {
        async fn append(&self, record: &AuditRecord) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.inner.append(record).await
        }

        async fn read_all(&self) -> Result<Vec<StoredRecord>> {
            self.inner.read_all().await
        }

        fn retention(&self) -> Duration {
            self.inner.retention()
        }
    }

    fn app_state(provider: Arc<MemoryProvider>, audit: Arc<dyn AuditLog>) -> AppState {
        let publisher = Arc::new(Publisher::new(provider, audit));
        let ingestor = Arc::new(Ingestor::new(Arc::new(Deduplicator::default()), publisher.clone()));
        AppState::new(
            ingestor,
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(DeclaredVariables::new()),
            Arc::new(AgentRegistry::new(publisher)),
        )
    }

    fn events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event::new(format!("e{}.firing", i), "test", "ops", serde_json::json!({"i": i})))
            .collect()
    }

    #[tokio::test]
    async fn test_run_publish_returns_work_result() {
        let provider = Arc::new(MemoryProvider::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let state = app_state(provider.clone(), audit.clone());

        let publisher = state.publisher.clone();
        let report = state
            .run_publish(move |ctx| async move { Ok(publisher.publish_events(&ctx, events(2)).await) })
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(provider.published().await.len(), 2);
        assert_eq!(audit.len().await, 2);
    }

    #[tokio::test]
    async fn test_abandoned_request_still_audits_attempts() {
        let provider = Arc::new(MemoryProvider::default());
        let audit = Arc::new(SlowAuditLog {
            inner: MemoryAuditLog::default(),
            delay: Duration::from_millis(200),
        });
        let state = app_state(provider.clone(), audit.clone());

        let publisher = state.publisher.clone();
        let request = state.run_publish(move |ctx| async move {
            Ok(publisher.publish_events(&ctx, events(3)).await)
        });

        // Drop the request while the first audit write is pending
        assert!(tokio::time::timeout(Duration::from_millis(50), request)
            .await
            .is_err());
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(provider.published().await.len(), 1);

        let records = audit.read_all().await.unwrap();
        let outcomes: Vec<&str> = records
            .iter()
            .rev()
            .map(|r| r.fields["publishSuccess"].as_str())
            .collect();
        assert_eq!(outcomes, vec!["true", "false"]);
    }
}
