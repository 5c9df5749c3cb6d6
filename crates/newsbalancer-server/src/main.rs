//! NewsBalancer API server binary.
//!
//! Loads configuration, initializes the store and analysis components,
//! starts the background collector and progress reaper, and serves the
//! HTTP API until interrupted.
//!
//! Exit codes: 0 on normal shutdown, 1 on fatal init errors, 2 on invalid
//! configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use newsbalancer_core::collector::{run_collector_loop, Collector};
use newsbalancer_core::config::Config;
use newsbalancer_core::ensemble::Orchestrator;
use newsbalancer_core::llm::HttpLlmScorer;
use newsbalancer_core::progress::{run_reaper_loop, ProgressManager};
use newsbalancer_core::storage;

use newsbalancer_server::state::AppState;

/// NewsBalancer API server — RSS ingestion, LLM bias analysis, REST + SSE.
#[derive(Parser)]
#[command(name = "newsbalancer-server", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Override the configured bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load_and_validate(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            eprintln!("invalid configuration:");
            for err in errors {
                eprintln!("  - {err}");
            }
            std::process::exit(2);
        }
    };

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Initialize tracing (RUST_LOG wins over the configured level).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let db = storage::init_db(&config.storage.db_path)
        .await
        .context("failed to initialize database")?;

    let scorer = Arc::new(HttpLlmScorer::new(&config.llm));
    let llm_metrics = scorer.metrics();

    let progress = Arc::new(ProgressManager::new(Duration::from_millis(
        config.progress.retention_ms,
    )));
    let orchestrator = Orchestrator::new(db.clone(), scorer, Arc::clone(&progress), &config);
    let collector = Collector::new(db.clone(), config.collector.clone());

    // One background task per periodic duty.
    let cancel = CancellationToken::new();
    let collector_task = tokio::spawn(run_collector_loop(collector.clone(), cancel.clone()));
    let reaper_task = tokio::spawn(run_reaper_loop(
        Arc::clone(&progress),
        Duration::from_secs(config.progress.reap_interval_seconds),
        cancel.clone(),
    ));

    let state = Arc::new(AppState {
        db,
        orchestrator,
        progress,
        collector,
        llm_metrics,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "newsbalancer server listening");

    let shutdown_cancel = cancel.clone();
    axum::serve(listener, newsbalancer_server::build_router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_cancel.cancel();
        })
        .await
        .context("server error")?;

    cancel.cancel();
    let _ = collector_task.await;
    let _ = reaper_task.await;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
