//! # a3s-ingest
//!
//! Event ingestion gateway for A3S hubs.
//!
//! ## Overview
//!
//! `a3s-ingest` accepts Prometheus Alertmanager webhooks and native events
//! over HTTP, normalizes them into one canonical [`Event`], suppresses
//! duplicate alert deliveries, publishes to the event bus, and writes a
//! retention-bounded audit trail of every publish attempt. Typed hub
//! variables are read from a key-value store and mutated by publishing
//! `var.*` events. Collector agents connect over an OpAMP WebSocket and
//! report replay completion through their logs.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_ingest::{Deduplicator, Ingestor, MemoryAuditLog, MemoryProvider, PublishContext, Publisher};
//!
//! # async fn example() -> a3s_ingest::Result<()> {
//! let publisher = Arc::new(Publisher::new(
//!     Arc::new(MemoryProvider::default()),
//!     Arc::new(MemoryAuditLog::default()),
//! ));
//! let ingestor = Ingestor::new(Arc::new(Deduplicator::default()), publisher);
//!
//! let outcome = ingestor
//!     .ingest(
//!         &PublishContext::background(),
//!         serde_json::json!({"name": "deploy.done", "hubName": "ops", "payload": {"v": 2}}),
//!     )
//!     .await?;
//! assert_eq!(outcome.report.successful, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **bus**: NATS JetStream or in-memory ([`EventProvider`])
//! - **audit**: Redis stream or in-memory ([`AuditLog`])
//! - **variables**: Redis or in-memory ([`KeyValueStore`])

pub mod adapter;
pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod dedup;
pub mod error;
pub mod kv;
pub mod pipeline;
pub mod provider;
pub mod publisher;
pub mod retry;
pub mod server;
pub mod types;
pub mod variables;

// Re-export core types
pub use adapter::{AlertBatch, Inbound, PayloadKind};
pub use agent::{AgentRecord, AgentRegistry};
pub use audit::{AuditEntry, AuditLog, AuditRecord, MemoryAuditLog, RedisAuditLog};
pub use config::IngestConfig;
pub use dedup::{DedupConfig, Deduplicator};
pub use error::{IngestError, Result};
pub use kv::{KeyValueStore, MemoryKeyValueStore, RedisKeyValueStore};
pub use pipeline::{IngestOutcome, IngestSource, Ingestor};
pub use provider::EventProvider;
pub use publisher::{PublishContext, PublishReport, Publisher};
pub use types::Event;
pub use variables::{Command, DeclaredVariables, VariableCatalog, VariableType};

// Re-export providers for convenience
pub use provider::memory::{MemoryConfig, MemoryProvider};
pub use provider::nats::{NatsClient, NatsConfig, NatsProvider, StorageType};
