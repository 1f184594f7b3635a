// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the run supervisor.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`crate::RunSupervisor`] operations.
///
/// State-machine precondition violations (`AlreadyRunning`, `NotRunning`)
/// leave the supervisor untouched. `SpawnFailed` leaves it `Idle`.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A run is already in flight; no queueing is performed.
    #[error("Benchmark already running")]
    AlreadyRunning,

    /// `stop` was requested but no run is in flight.
    #[error("No benchmark running")]
    NotRunning,

    /// The benchmark executable could not be launched.
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The child did not exit within the graceful-stop window.
    ///
    /// Only ever logged; the supervisor escalates to a forced kill.
    #[error("Benchmark did not exit within {}ms of the stop request", grace_period.as_millis())]
    StopTimeout {
        /// Configured grace period.
        grace_period: Duration,
    },

    /// The run configuration failed validation.
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),
}

impl SupervisorError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        SupervisorError::InvalidConfig(msg.into())
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::NotRunning => "NOT_RUNNING",
            Self::SpawnFailed { .. } => "SPAWN_FAILED",
            Self::StopTimeout { .. } => "STOP_TIMEOUT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
