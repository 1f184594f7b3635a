// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark report discovery, normalization and aggregation.
//!
//! Benchmark runs leave JSON artifacts in a directory. This crate reads them
//! back on demand: [`scanner`] finds and parses artifacts, [`normalize`]
//! turns both on-disk shapes into one [`BenchmarkRecord`] type, and
//! [`aggregate`] computes summary statistics and groups records into runs.
//! [`ReportStore`] ties these together behind the query operations used by
//! the dashboard service and CLI.
//!
//! # Example
//!
//! ```no_run
//! use benchdash_reports::ReportStore;
//!
//! let store = ReportStore::new("../benchmarks");
//! let listing = store.list_records()?;
//! println!(
//!     "{} records, mean proof time {} ms",
//!     listing.count, listing.metrics.avg_proof_time
//! );
//! # Ok::<(), benchdash_reports::ReportError>(())
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod history;
pub mod markdown;
pub mod normalize;
pub mod record;
pub mod scanner;
pub mod store;

pub use aggregate::{aggregate, group_into_runs, AggregateMetrics, RunGroup, RunSummary};
pub use error::{ReportError, Result};
pub use history::{recent_history, HistoryEntry, DEFAULT_HISTORY_LIMIT};
pub use normalize::{infer_scenario, normalize, normalize_all};
pub use record::{BenchmarkRecord, RawReportBody, TrainingMetrics, ZkpMetrics};
pub use scanner::{scan, RawReport, ReportFile};
pub use store::{LatestBenchmark, RecordListing, ReportStore};
