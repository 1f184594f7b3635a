// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dashboard API service entry point.

use anyhow::{Context, Result};
use benchdash_core::RunSupervisor;
use clap::Parser;
use dashboard_api::{router, AppState, Settings};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Benchmark dashboard API server.
#[derive(Parser, Debug)]
#[command(name = "dashboard-api")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (TOML, YAML or JSON).
    #[arg(short, long, env = "BENCHDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to.
    #[arg(long, env = "BENCHDASH_HOST")]
    host: Option<String>,

    /// Port to bind to.
    #[arg(short, long, env = "BENCHDASH_PORT")]
    port: Option<u16>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));

    if settings.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if args.debug {
        settings.log.level = "debug".to_string();
    }

    init_tracing(&settings);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    if let Err(e) = std::fs::create_dir_all(&settings.reports.dir) {
        warn!(dir = %settings.reports.dir.display(), error = %e, "Cannot create report directory");
    }

    let supervisor = RunSupervisor::new(settings.supervisor_config());
    let state = AppState::new(settings.report_store(), supervisor.clone())
        .with_history_limit(settings.reports.history_limit)
        .with_metrics(metrics);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        addr = %addr,
        reports_dir = %settings.reports.dir.display(),
        workspace_dir = %supervisor.config().workspace_dir.display(),
        "Dashboard API listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if supervisor.status().await.running {
        info!("Stopping active benchmark before exit");
        if let Err(e) = supervisor.stop().await {
            warn!(error = %e, "Failed to stop active benchmark");
        }
    }

    Ok(())
}
