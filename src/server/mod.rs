pub mod router;
pub mod state;

use std::sync::Arc;

use crate::agent::AgentRegistry;
use crate::audit::{AuditLog, MemoryAuditLog, RedisAuditLog};
use crate::config::IngestConfig;
use crate::dedup::Deduplicator;
use crate::error::{IngestError, Result};
use crate::kv::{self, KeyValueStore, MemoryKeyValueStore, RedisKeyValueStore};
use crate::pipeline::Ingestor;
use crate::provider::memory::MemoryProvider;
use crate::provider::nats::NatsProvider;
use crate::provider::EventProvider;
use crate::publisher::Publisher;
use crate::retry::retry_with_backoff;
use crate::variables::{DeclaredVariables, VariableCatalog};

/// Connect backends and build the application state.
pub async fn bootstrap(config: &IngestConfig) -> Result<state::AppState> {
    let retry = config.retry();

    let provider: Arc<dyn EventProvider> = match config.nats() {
        Some(nats) => Arc::new(NatsProvider::connect_with_retry(nats, &retry).await?),
        None => {
            tracing::warn!("NATS_URL not set, publishing to the in-memory bus");
            Arc::new(MemoryProvider::new(config.memory_bus()))
        }
    };

    let (audit, kv): (Arc<dyn AuditLog>, Arc<dyn KeyValueStore>) = match &config.redis_url {
        Some(url) => {
            let conn = retry_with_backoff("redis", &retry, || kv::redis::connect(url)).await?;
            let audit = RedisAuditLog::from_connection(
                conn.clone(),
                &config.audit_stream_key,
                config.audit_retention(),
            );
            (Arc::new(audit), Arc::new(RedisKeyValueStore::from_connection(conn)))
        }
        None => {
            tracing::warn!("REDIS_URL not set, audit log and variables are in-memory");
            (
                Arc::new(MemoryAuditLog::new(config.audit_retention())),
                Arc::new(MemoryKeyValueStore::new()),
            )
        }
    };

    let variables: Arc<dyn VariableCatalog> = match &config.variables_file {
        Some(path) => Arc::new(DeclaredVariables::load_file(path)?),
        None => Arc::new(DeclaredVariables::new()),
    };

    let publisher = Arc::new(Publisher::new(provider, audit));
    let ingestor = Arc::new(Ingestor::new(
        Arc::new(Deduplicator::new(config.dedup())),
        publisher.clone(),
    ));
    let agents = Arc::new(AgentRegistry::new(publisher));

    tracing::info!(
        provider = ingestor.publisher().provider().name(),
        retention_days = config.audit_retention_days,
        "Initialized backends"
    );

    Ok(state::AppState::new(ingestor, kv, variables, agents)
        .with_request_timeout(config.request_timeout()))
}

/// Start the HTTP server with the given configuration.
pub async fn start(config: IngestConfig) -> Result<()> {
    let app_state = bootstrap(&config).await?;
    let agents = app_state.agents.clone();
    let app = router::build(app_state);

    let bind_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| IngestError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(agents))
        .await
        .map_err(|e| IngestError::Server(format!("Server error: {e}")))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(agents: Arc<AgentRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(agents = agents.len(), "Shutdown signal received");
    agents.shutdown();
}
