// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark dashboard API.
//!
//! HTTP surface over the report store and the run supervisor. Handlers stay
//! thin: report queries run on the blocking pool and supervisor calls are
//! forwarded as-is, with errors mapped to a JSON envelope by [`ApiError`].

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Settings;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::benchmarks::routes())
        .merge(routes::runs::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
