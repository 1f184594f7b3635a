// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run lifecycle types for the benchmark supervisor.
//!
//! A run is one launch of the external benchmark workload. The supervisor
//! owns at most one run at a time and moves through the following states:
//!
//! ```text
//! Idle ──start──▶ Running ──exit 0──────▶ Completed ──▶ Idle
//!                    │    ──exit != 0───▶ Failed    ──▶ Idle
//!                    └────stop──────────▶ Cancelled ──▶ Idle
//! ```
//!
//! Terminal states are transient: once the [`RunOutcome`] is recorded the
//! supervisor returns to [`RunState::Idle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SupervisorError};

/// Unique identifier for a launched run.
pub type RunId = String;

/// State of the run supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No child process owned.
    #[default]
    Idle,
    /// A child process is owned and executing.
    Running,
    /// The child exited with code 0.
    Completed,
    /// The child exited non-zero, was killed by a signal, or could not be waited on.
    Failed,
    /// The child was stopped on request.
    Cancelled,
}

impl RunState {
    /// Lower-case label, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stop request was honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// The child exited within the grace period after the termination signal.
    Graceful,
    /// The grace period elapsed and the child was killed.
    Forced,
}

impl StopKind {
    /// Status message recorded for this kind of stop.
    pub fn message(&self) -> &'static str {
        match self {
            StopKind::Graceful => "Benchmark stopped by user",
            StopKind::Forced => "Benchmark forcefully terminated",
        }
    }
}

/// Scenario names understood by the benchmark workload.
///
/// Names outside this table are forwarded unchanged, see [`map_scenario`].
pub const SCENARIO_TABLE: &[(&str, &str)] = &[
    ("single-client", "single-client"),
    ("multi-client-sequential", "multi-client-sequential"),
    ("multi-client-concurrent", "multi-client-concurrent"),
    ("stress-test", "stress-test"),
    ("custom", "custom"),
];

/// Map a caller-facing scenario name onto the workload's `--scenario` value.
///
/// Unrecognised names pass through untouched.
pub fn map_scenario(name: &str) -> &str {
    SCENARIO_TABLE
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

/// Configuration for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Scenario name, see [`map_scenario`].
    pub scenario: String,
    /// Number of simulated clients.
    pub num_clients: u32,
    /// Number of training rounds.
    pub num_rounds: u32,
    /// Delay between client starts, in milliseconds.
    #[serde(alias = "clientDelay")]
    pub client_delay_ms: u64,
    /// Maximum number of concurrently running clients.
    pub max_concurrent: u32,
    /// Aggregation server URL, if the workload should target a remote server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: "single-client".to_string(),
            num_clients: 1,
            num_rounds: 1,
            client_delay_ms: 0,
            max_concurrent: 1,
            server_url: None,
        }
    }
}

impl RunConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Check the numeric bounds and required fields.
    pub fn validate(&self) -> Result<()> {
        if self.scenario.trim().is_empty() {
            return Err(SupervisorError::invalid_config("scenario must not be empty"));
        }
        if self.num_clients == 0 {
            return Err(SupervisorError::invalid_config("numClients must be greater than 0"));
        }
        if self.num_rounds == 0 {
            return Err(SupervisorError::invalid_config("numRounds must be greater than 0"));
        }
        if self.max_concurrent == 0 {
            return Err(SupervisorError::invalid_config(
                "maxConcurrent must be greater than 0",
            ));
        }
        if matches!(self.server_url.as_deref(), Some(url) if url.trim().is_empty()) {
            return Err(SupervisorError::invalid_config("serverUrl must not be empty"));
        }
        Ok(())
    }

    /// Workload arguments for this configuration, in a fixed order.
    ///
    /// `--server-url` is only present when a server URL was given; `--verbose`
    /// is always last.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--scenario".to_string(),
            map_scenario(&self.scenario).to_string(),
            "--num-clients".to_string(),
            self.num_clients.to_string(),
            "--rounds".to_string(),
            self.num_rounds.to_string(),
            "--client-delay-ms".to_string(),
            self.client_delay_ms.to_string(),
            "--max-concurrent".to_string(),
            self.max_concurrent.to_string(),
        ];

        if let Some(url) = &self.server_url {
            args.push("--server-url".to_string());
            args.push(url.clone());
        }

        args.push("--verbose".to_string());
        args
    }
}

/// Builder for [`RunConfig`] instances.
#[derive(Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Set the scenario name.
    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.config.scenario = scenario.into();
        self
    }

    /// Set the client count.
    pub fn num_clients(mut self, n: u32) -> Self {
        self.config.num_clients = n;
        self
    }

    /// Set the round count.
    pub fn num_rounds(mut self, n: u32) -> Self {
        self.config.num_rounds = n;
        self
    }

    /// Set the delay between client starts.
    pub fn client_delay_ms(mut self, ms: u64) -> Self {
        self.config.client_delay_ms = ms;
        self
    }

    /// Set the concurrency cap.
    pub fn max_concurrent(mut self, n: u32) -> Self {
        self.config.max_concurrent = n;
        self
    }

    /// Set the aggregation server URL.
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    /// Build and validate the [`RunConfig`].
    pub fn build(self) -> Result<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// A state change published by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Run the transition belongs to.
    pub run_id: RunId,
    /// Previous state.
    pub from: RunState,
    /// New state.
    pub to: RunState,
    /// Status message after the transition.
    pub message: String,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

/// Recorded result of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Run identifier.
    pub run_id: RunId,
    /// Terminal state reached.
    pub state: RunState,
    /// Process exit code, when the process exited normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Final status message.
    pub message: String,
    /// How the run was stopped, for cancelled runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopKind>,
    /// Captured standard output (bounded).
    pub stdout: String,
    /// Captured standard error (bounded).
    pub stderr: String,
    /// Launch time.
    pub started_at: DateTime<Utc>,
    /// Time the outcome was recorded.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunOutcome {
    /// Whether the run completed successfully.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Returned by a successful `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAccepted {
    /// Identifier assigned to the run.
    pub run_id: RunId,
    /// OS process id of the spawned workload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Full command line that was launched.
    pub command: Vec<String>,
    /// The accepted configuration.
    pub config: RunConfig,
}

/// Snapshot of the supervisor, as returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    /// Whether a run currently owns the supervisor.
    pub running: bool,
    /// Human-readable status message.
    pub message: String,
    /// Current state.
    pub state: RunState,
    /// Active run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// OS process id of the active run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Launch time of the active run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Outcome of the most recently finished run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RunOutcome>,
}
