//! NATS JetStream event provider
//!
//! Implements `EventProvider` using NATS JetStream for persistent,
//! at-least-once delivery to downstream automation.

mod client;
mod config;

pub use client::{NatsClient, StreamInfo};
pub use config::{NatsConfig, StorageType};

use crate::error::Result;
use crate::provider::EventProvider;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::Event;
use async_trait::async_trait;

/// Event provider publishing to a JetStream stream
pub struct NatsProvider {
    client: NatsClient,
}

impl NatsProvider {
    /// Connect to NATS and initialize the JetStream stream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Connect, retrying with exponential backoff until `retry.max_elapsed`
    pub async fn connect_with_retry(config: NatsConfig, retry: &RetryConfig) -> Result<Self> {
        retry_with_backoff("nats", retry, || Self::connect(config.clone())).await
    }

    /// The JetStream session behind this provider
    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl EventProvider for NatsProvider {
    async fn publish(&self, subject: &str, event: &Event) -> Result<u64> {
        self.client.publish(subject, event).await
    }

    fn build_subject(&self, hub: &str, name: &str) -> String {
        self.client.config().build_subject(hub, name)
    }

    fn name(&self) -> &str {
        "nats"
    }

    async fn health(&self) -> Result<bool> {
        self.client.stream_info().await.map(|_| true)
    }
}
