// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Record, aggregate, file and history queries.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use benchdash_reports::{
    AggregateMetrics, BenchmarkRecord, HistoryEntry, LatestBenchmark, RecordListing, ReportFile,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Artifact listing.
#[derive(Debug, Serialize)]
pub struct FileListing {
    /// Artifacts, newest first.
    pub files: Vec<ReportFile>,
    /// Number of artifacts.
    pub count: usize,
}

/// Query string for `/api/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Number of entries; the configured default when absent.
    pub limit: Option<usize>,
}

/// History listing.
#[derive(Debug, Serialize)]
pub struct HistoryListing {
    /// Entries, newest first.
    pub history: Vec<HistoryEntry>,
    /// Number of entries.
    pub count: usize,
}

/// Report query routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/benchmarks", get(list_benchmarks))
        .route("/api/benchmarks/:session_id", get(get_benchmark))
        .route("/api/metrics", get(get_metrics))
        .route("/api/files", get(list_files))
        .route("/api/history", get(get_history))
        .route("/api/latest", get(get_latest))
}

async fn list_benchmarks(State(state): State<Arc<AppState>>) -> ApiResult<Json<RecordListing>> {
    let listing = state.query(|store| store.list_records()).await?;
    Ok(Json(listing))
}

async fn get_benchmark(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<BenchmarkRecord>> {
    let lookup = session_id.clone();
    state
        .query(move |store| store.get_record(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Benchmark '{session_id}'")))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> ApiResult<Json<AggregateMetrics>> {
    let metrics = state.query(|store| store.aggregate_metrics()).await?;
    Ok(Json(metrics))
}

async fn list_files(State(state): State<Arc<AppState>>) -> ApiResult<Json<FileListing>> {
    let files = state.query(|store| store.list_files()).await?;
    Ok(Json(FileListing {
        count: files.len(),
        files,
    }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryListing>> {
    let limit = params.limit.unwrap_or(state.history_limit);
    let history = state.query(move |store| store.history(limit)).await?;
    Ok(Json(HistoryListing {
        count: history.len(),
        history,
    }))
}

async fn get_latest(State(state): State<Arc<AppState>>) -> ApiResult<Json<LatestBenchmark>> {
    let latest = state.query(|store| store.latest()).await?;
    if latest.is_empty() {
        return Err(ApiError::not_found("Benchmark data"));
    }
    Ok(Json(latest))
}
