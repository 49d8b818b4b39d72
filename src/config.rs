//! Gateway configuration
//!
//! Every setting is a command-line flag that falls back to an environment
//! variable, then to a default.

use crate::dedup::DedupConfig;
use crate::provider::memory::MemoryConfig;
use crate::provider::nats::NatsConfig;
use crate::retry::RetryConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "a3s-ingest")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Event ingestion gateway for A3S hubs")]
pub struct IngestConfig {
    /// Host to bind to
    #[arg(long, env = "INGEST_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "INGEST_PORT", default_value_t = 8080)]
    pub port: u16,

    /// NATS server URL (in-memory bus when unset)
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,

    /// JetStream stream name
    #[arg(long, env = "NATS_STREAM", default_value = "HUB_EVENTS")]
    pub nats_stream: String,

    /// Subject prefix for published events
    #[arg(long, env = "EVENT_SUBJECT_PREFIX", default_value = "events")]
    pub subject_prefix: String,

    /// Redis URL for the audit log and variable store (in-memory when unset)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Redis stream holding audit records
    #[arg(long, env = "AUDIT_STREAM_KEY", default_value = "audit:events")]
    pub audit_stream_key: String,

    /// Audit retention in days
    #[arg(long, env = "AUDIT_RETENTION_DAYS", default_value_t = 30)]
    pub audit_retention_days: u64,

    /// JSON file of declared variables (`{hub: {name: type}}`)
    #[arg(long, env = "VARIABLES_FILE")]
    pub variables_file: Option<PathBuf>,

    /// Fingerprints remembered by the deduplicator
    #[arg(long, env = "DEDUP_MAX_ENTRIES", default_value_t = 100_000)]
    pub dedup_max_entries: usize,

    /// Forget fingerprints accepted longer ago than this
    #[arg(long, env = "DEDUP_TTL_SECS")]
    pub dedup_ttl_secs: Option<u64>,

    /// Per-request publish deadline
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Give up connecting to NATS/Redis after this long
    #[arg(long, env = "CONNECT_MAX_ELAPSED_SECS", default_value_t = 60)]
    pub connect_max_elapsed_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl IngestConfig {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn audit_retention(&self) -> Duration {
        Duration::from_secs(self.audit_retention_days.saturating_mul(24 * 3600))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn dedup(&self) -> DedupConfig {
        DedupConfig {
            max_entries: self.dedup_max_entries,
            ttl: self.dedup_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_elapsed: Duration::from_secs(self.connect_max_elapsed_secs),
            ..Default::default()
        }
    }

    /// JetStream settings, if a NATS URL is configured
    pub fn nats(&self) -> Option<NatsConfig> {
        self.nats_url.as_ref().map(|url| NatsConfig {
            url: url.clone(),
            stream_name: self.nats_stream.clone(),
            subject_prefix: self.subject_prefix.clone(),
            ..Default::default()
        })
    }

    pub fn memory_bus(&self) -> MemoryConfig {
        MemoryConfig {
            subject_prefix: self.subject_prefix.clone(),
            ..Default::default()
        }
    }
}
