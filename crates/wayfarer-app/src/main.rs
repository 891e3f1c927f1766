//! Wayfarer application binary - composition root.
//!
//! 1. Load configuration from TOML, applying CLI and env overrides
//! 2. Build the external provider clients
//! 3. Start the session sweeper
//! 4. Serve the REST API until Ctrl-C

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wayfarer_api::AppState;
use wayfarer_chat::DialogueOrchestrator;
use wayfarer_core::config::WayfarerConfig;

use crate::cli::CliArgs;

/// Evict idle sessions and stale cache entries on a fixed cadence.
async fn sweep_loop(orchestrator: Arc<DialogueOrchestrator>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let sessions = orchestrator.store().evict_expired();
        let entries = orchestrator.aggregator().cache().purge_stale();
        if sessions > 0 || entries > 0 {
            tracing::debug!(sessions, cache_entries = entries, "Sweep evicted expired state");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = WayfarerConfig::load_or_default(&config_file);
    config.server.port = args.resolve_port(config.server.port);
    config.server.host = args.resolve_host(&config.server.host);
    config.general.log_level = args.resolve_log_level(&config.general.log_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Wayfarer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    config.validate()?;

    let providers = wayfarer_providers::build_providers(&config.providers, &config.aggregator)?;
    let orchestrator = Arc::new(DialogueOrchestrator::new(providers, &config));

    let sweep_every = Duration::from_secs(config.session.sweep_interval_secs.max(1));
    tokio::spawn(sweep_loop(Arc::clone(&orchestrator), sweep_every));
    tracing::info!(
        idle_timeout_minutes = config.session.idle_timeout_minutes,
        sweep_interval_secs = sweep_every.as_secs(),
        "Session sweeper started"
    );

    let state = AppState::new(orchestrator, config);
    wayfarer_api::serve(state, shutdown_signal()).await?;

    Ok(())
}
