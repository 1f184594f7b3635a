// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared handler state.

use benchdash_core::RunSupervisor;
use benchdash_reports::{ReportStore, DEFAULT_HISTORY_LIMIT};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::error::ApiResult;

/// State shared by all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Report directory being served.
    pub store: ReportStore,
    /// The process-wide run supervisor.
    pub supervisor: RunSupervisor,
    /// History length when the request gives none.
    pub history_limit: usize,
    /// Prometheus exporter, when installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State with the default history limit and no metrics exporter.
    pub fn new(store: ReportStore, supervisor: RunSupervisor) -> Self {
        Self {
            store,
            supervisor,
            history_limit: DEFAULT_HISTORY_LIMIT,
            metrics: None,
        }
    }

    /// Set the default history limit.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Run a report query on the blocking pool.
    pub async fn query<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&ReportStore) -> benchdash_reports::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
    }
}
