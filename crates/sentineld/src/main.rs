use std::sync::{Arc, Mutex};

use anyhow::Result;
use sentinel_core::DecisionLedger;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod rate_limiter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("sentineld starting");

    let config = config::Config::from_env();
    let thresholds = config.thresholds()?;
    let ledger = DecisionLedger::open(
        config.ledger_path.clone(),
        config.snapshot_dir.clone(),
        thresholds.ledger_capacity,
    )?;
    tracing::info!(
        path = %ledger.path().display(),
        entries = ledger.len(),
        "audit ledger opened"
    );
    let ledger = Arc::new(Mutex::new(ledger));

    // Camera frontends construct a session registry and rate limiter
    // around this shared ledger when they attach; frame ingestion lives
    // outside this binary.
    tracing::info!("sentineld ready");

    tokio::signal::ctrl_c().await?;

    let stats = ledger.lock().unwrap_or_else(|e| e.into_inner()).stats();
    tracing::info!(
        total = stats.total,
        granted = stats.granted,
        denied = stats.denied,
        "sentineld shutting down"
    );

    Ok(())
}
