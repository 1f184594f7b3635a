// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run orchestration core for benchdash.
//!
//! This crate owns the single-flight supervisor that launches the external
//! benchmark workload, tracks its lifecycle and publishes status transitions.
//!
//! # Quick Start
//!
//! ```no_run
//! use benchdash_core::{RunConfig, RunSupervisor, SupervisorConfig};
//!
//! # async fn demo() -> benchdash_core::Result<()> {
//! let supervisor = RunSupervisor::new(SupervisorConfig::new("/srv/zkp-fl"));
//!
//! let config = RunConfig::builder()
//!     .scenario("multi-client-concurrent")
//!     .num_clients(4)
//!     .num_rounds(3)
//!     .max_concurrent(4)
//!     .build()?;
//!
//! let accepted = supervisor.start(config).await?;
//! println!("started run {}", accepted.run_id);
//!
//! let status = supervisor.status().await;
//! println!("{}: {}", status.state, status.message);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`run`] - Run state, configuration and outcome types
//! - [`supervisor`] - The [`RunSupervisor`] state machine
//! - [`error`] - Error taxonomy for supervisor operations

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod run;
pub mod supervisor;

pub use error::{Result, SupervisorError};
pub use run::{
    map_scenario, RunAccepted, RunConfig, RunId, RunOutcome, RunState, RunStatus,
    StateTransition, StopKind,
};
pub use supervisor::{RunSupervisor, SupervisorConfig, DEFAULT_GRACE_PERIOD};
