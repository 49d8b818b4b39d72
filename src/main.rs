//! a3s-ingest - event ingestion gateway for A3S hubs

use a3s_ingest::config::{IngestConfig, LogFormat};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = IngestConfig::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "a3s_ingest=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind_address(),
        "Starting a3s-ingest"
    );

    a3s_ingest::server::start(config)
        .await
        .context("ingest gateway failed")?;

    Ok(())
}
