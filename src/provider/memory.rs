//! In-memory event provider for tests and single-process deployments

use super::{subject_token, EventProvider};
use crate::error::{IngestError, Result};
use crate::types::Event;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Subject prefix (default: "events")
    pub subject_prefix: String,

    /// Maximum retained messages; oldest are dropped beyond this (0 = unlimited)
    pub max_events: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "events".to_string(),
            max_events: 100_000,
        }
    }
}

/// A message as seen by the in-memory bus
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub sequence: u64,
    pub subject: String,
    pub event: Event,
}

/// In-memory bus
///
/// Keeps published messages in a capped `Vec`. Can be switched offline to
/// exercise publish-failure paths.
pub struct MemoryProvider {
    config: MemoryConfig,
    messages: RwLock<Vec<PublishedEvent>>,
    sequence: AtomicU64,
    available: AtomicBool,
}

impl MemoryProvider {
    /// Create a provider with the given configuration
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            messages: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a bus outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// All retained messages, oldest first
    pub async fn published(&self) -> Vec<PublishedEvent> {
        self.messages.read().await.clone()
    }

    /// Retained messages whose subject starts with `prefix`
    pub async fn published_on(&self, prefix: &str) -> Vec<PublishedEvent> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.subject.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[async_trait]
impl EventProvider for MemoryProvider {
    async fn publish(&self, subject: &str, event: &Event) -> Result<u64> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(IngestError::Publish {
                subject: subject.to_string(),
                reason: "memory provider unavailable".to_string(),
            });
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut messages = self.messages.write().await;
        messages.push(PublishedEvent {
            sequence,
            subject: subject.to_string(),
            event: event.clone(),
        });

        if self.config.max_events > 0 && messages.len() > self.config.max_events {
            let drain_count = messages.len() - self.config.max_events;
            messages.drain(..drain_count);
        }

        tracing::debug!(event_id = %event.id, subject, sequence, "Event published");
        Ok(sequence)
    }

    fn build_subject(&self, hub: &str, name: &str) -> String {
        format!(
            "{}.{}.{}",
            self.config.subject_prefix,
            subject_token(hub, false),
            subject_token(name, true)
        )
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn health(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }
}
