// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run listing and run control.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use benchdash_core::{RunConfig, RunId, RunStatus, StopKind};
use benchdash_reports::{BenchmarkRecord, RunSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run listing.
#[derive(Debug, Serialize)]
pub struct RunListing {
    /// Runs, newest start time first.
    pub runs: Vec<RunSummary>,
    /// Number of runs.
    pub count: usize,
}

/// One run with its records.
#[derive(Debug, Serialize)]
pub struct RunDetail {
    /// Run summary fields.
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Member records, in discovery order.
    pub records: Vec<BenchmarkRecord>,
}

/// Body of `POST /api/run-benchmark`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Free-form label sent by the dashboard; informational only.
    #[serde(default)]
    pub command: Option<String>,
    /// Run parameters.
    pub config: RunConfig,
}

/// Response to an accepted run request.
#[derive(Debug, Serialize)]
pub struct RunStarted {
    /// Always true.
    pub success: bool,
    /// Status message.
    pub message: &'static str,
    /// Identifier of the new run.
    pub run_id: RunId,
    /// Process id of the workload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Launched command line.
    pub command: Vec<String>,
    /// Accepted configuration.
    pub config: RunConfig,
}

/// Response to a stop request.
#[derive(Debug, Serialize)]
pub struct RunStopped {
    /// Always true.
    pub success: bool,
    /// Status message.
    pub message: &'static str,
    /// Whether the workload exited on its own or was killed.
    pub stop: StopKind,
}

/// Run routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/runs", get(list_runs))
        .route("/api/runs/:run_id", get(get_run))
        .route("/api/run-benchmark", post(start_run))
        .route("/api/stop-benchmark", post(stop_run))
        .route("/api/status", get(run_status))
}

async fn list_runs(State(state): State<Arc<AppState>>) -> ApiResult<Json<RunListing>> {
    let runs = state.query(|store| store.list_runs()).await?;
    Ok(Json(RunListing {
        count: runs.len(),
        runs,
    }))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunDetail>> {
    let lookup = run_id.clone();
    let group = state
        .query(move |store| store.get_run(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Run '{run_id}'")))?;

    Ok(Json(RunDetail {
        summary: group.summary(),
        records: group.records,
    }))
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RunStarted>)> {
    let Json(request) = payload?;
    if let Some(command) = &request.command {
        info!(command = %command, "Run requested");
    }

    let accepted = state.supervisor.start(request.config).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            success: true,
            message: "Benchmark started",
            run_id: accepted.run_id,
            pid: accepted.pid,
            command: accepted.command,
            config: accepted.config,
        }),
    ))
}

async fn stop_run(State(state): State<Arc<AppState>>) -> ApiResult<Json<RunStopped>> {
    let stop = state.supervisor.stop().await?;
    Ok(Json(RunStopped {
        success: true,
        message: stop.message(),
        stop,
    }))
}

async fn run_status(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    Json(state.supervisor.status().await)
}
