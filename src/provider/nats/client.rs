//! JetStream session for the gateway's bus
//!
//! Opening a session declares (or adopts) the stream that captures every
//! canonical subject plus the extra replay subjects.

use super::config::{NatsConfig, StorageType};
use crate::error::{IngestError, Result};
use crate::types::Event;
use async_nats::jetstream::{self, stream};
use std::time::Duration;
use tokio::sync::Mutex;

/// Message header JetStream uses for broker-side deduplication
const MSG_ID_HEADER: &str = "Nats-Msg-Id";

/// Connected JetStream session bound to one stream
pub struct NatsClient {
    jetstream: jetstream::Context,

    // `Stream::info` takes `&mut self`
    stream: Mutex<stream::Stream>,

    config: NatsConfig,
}

impl NatsClient {
    /// Connect and make sure the configured stream exists
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = connect_options(&config)
            .connect(&config.url)
            .await
            .map_err(|e| IngestError::Connection(format!("{}: {}", config.url, e)))?;
        tracing::info!(url = %config.url, "Connected to NATS");

        let jetstream = jetstream::new(client);
        let stream = jetstream
            .get_or_create_stream(stream_config(&config))
            .await
            .map_err(|e| {
                IngestError::Connection(format!("stream '{}' unavailable: {}", config.stream_name, e))
            })?;
        tracing::info!(
            stream = %config.stream_name,
            subjects = ?config.stream_subjects(),
            "JetStream stream ready"
        );

        Ok(Self {
            jetstream,
            stream: Mutex::new(stream),
            config,
        })
    }

    /// Publish `event` as JSON and wait for the broker ack
    ///
    /// Returns the stream sequence. A copy the broker already holds inside its
    /// duplicate window acks with the original sequence.
    pub async fn publish(&self, subject: &str, event: &Event) -> Result<u64> {
        let payload = serde_json::to_vec(event)?;
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MSG_ID_HEADER, event.id.as_str());

        let failed = |reason: String| IngestError::Publish {
            subject: subject.to_string(),
            reason,
        };

        let ack = self
            .jetstream
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await
            .map_err(|e| failed(e.to_string()))?
            .await
            .map_err(|e| failed(format!("no ack: {}", e)))?;

        if ack.duplicate {
            tracing::debug!(event_id = %event.id, subject, sequence = ack.sequence, "Broker dropped duplicate");
        }
        Ok(ack.sequence)
    }

    /// Current message counts and sequence bounds of the stream
    pub async fn stream_info(&self) -> Result<StreamInfo> {
        let mut stream = self.stream.lock().await;
        let info = stream
            .info()
            .await
            .map_err(|e| IngestError::Connection(format!("stream info: {}", e)))?;
        let state = &info.state;

        Ok(StreamInfo {
            messages: state.messages,
            bytes: state.bytes,
            first_sequence: state.first_sequence,
            last_sequence: state.last_sequence,
        })
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

/// Stream state snapshot
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub messages: u64,
    pub bytes: u64,
    pub first_sequence: u64,
    pub last_sequence: u64,
}

fn connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    match &config.token {
        Some(token) => opts.token(token.clone()),
        None => opts,
    }
}

/// Limits-retention stream over the canonical and extra subjects
fn stream_config(config: &NatsConfig) -> stream::Config {
    stream::Config {
        name: config.stream_name.clone(),
        subjects: config.stream_subjects(),
        storage: match config.storage {
            StorageType::File => stream::StorageType::File,
            StorageType::Memory => stream::StorageType::Memory,
        },
        max_messages: config.max_events,
        max_age: Duration::from_secs(config.max_age_secs),
        max_bytes: config.max_bytes,
        duplicate_window: Duration::from_secs(config.duplicate_window_secs),
        retention: stream::RetentionPolicy::Limits,
        ..Default::default()
    }
}
