// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Service settings.
//!
//! Settings are layered: built-in defaults, then an optional config file,
//! then `BENCHDASH__`-prefixed environment variables using `__` between
//! sections (`BENCHDASH__SERVER__PORT=9000`). Command-line flags are applied
//! on top by the binary.

use benchdash_core::SupervisorConfig;
use benchdash_reports::{ReportStore, DEFAULT_HISTORY_LIMIT};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BENCHDASH";

/// All service settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Report directory settings.
    pub reports: ReportSettings,
    /// Benchmark launch settings.
    pub runner: RunnerSettings,
    /// Logging settings.
    pub log: LogSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
        }
    }
}

/// Report directory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Directory holding benchmark artifacts.
    pub dir: PathBuf,
    /// Default number of history entries.
    pub history_limit: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("../benchmarks"),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Benchmark launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Executable to launch.
    pub program: String,
    /// Arguments placed before the per-run arguments.
    pub args: Vec<String>,
    /// Orchestration root the benchmark runs in.
    pub workspace_dir: PathBuf,
    /// Seconds between the termination signal and a forced kill.
    pub grace_period_secs: u64,
    /// Per-stream cap on captured output.
    pub max_output_bytes: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        let supervisor = SupervisorConfig::default();
        Self {
            program: supervisor.program,
            args: supervisor.base_args,
            workspace_dir: supervisor.workspace_dir,
            grace_period_secs: supervisor.grace_period.as_secs(),
            max_output_bytes: supervisor.max_output_bytes,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the optional file at `path` and the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    /// Supervisor configuration for [`benchdash_core::RunSupervisor`].
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::new(&self.runner.workspace_dir)
            .with_program(&self.runner.program, self.runner.args.iter().cloned())
            .with_grace_period(Duration::from_secs(self.runner.grace_period_secs))
            .with_max_output_bytes(self.runner.max_output_bytes)
    }

    /// Report store over the configured directory.
    pub fn report_store(&self) -> ReportStore {
        ReportStore::new(&self.reports.dir)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("runner.args")
}
