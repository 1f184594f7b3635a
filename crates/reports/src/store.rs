// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Query surface over a report directory.
//!
//! Nothing is cached: every call rescans the directory, so two calls may see
//! different data if artifacts change in between.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::aggregate::{aggregate, group_into_runs, AggregateMetrics, RunGroup, RunSummary};
use crate::error::Result;
use crate::history::{recent_history, HistoryEntry};
use crate::normalize::normalize_all;
use crate::record::BenchmarkRecord;
use crate::scanner::{self, ReportFile};

/// Result of [`ReportStore::list_records`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordListing {
    /// All records, newest artifact first.
    pub benchmarks: Vec<BenchmarkRecord>,
    /// Number of records.
    pub count: usize,
    /// Aggregate over `benchmarks`.
    pub metrics: AggregateMetrics,
}

/// Result of [`ReportStore::latest`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatestBenchmark {
    /// First record of the newest parsable artifact.
    pub record: Option<BenchmarkRecord>,
    /// Newest readable run summary file.
    pub summary_file: Option<ReportFile>,
    /// Text of `summary_file`.
    pub summary: Option<String>,
}

impl LatestBenchmark {
    /// Whether neither a record nor a summary was found.
    pub fn is_empty(&self) -> bool {
        self.record.is_none() && self.summary.is_none()
    }
}

/// Read-only view of a directory of benchmark artifacts.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Create a store over `dir`. The directory need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan and normalize every artifact.
    ///
    /// # Errors
    ///
    /// Fails only when the directory exists but cannot be listed.
    pub fn records(&self) -> Result<Vec<BenchmarkRecord>> {
        let reports = scanner::scan(&self.dir)?;
        Ok(normalize_all(reports))
    }

    /// All records with their count and aggregate.
    pub fn list_records(&self) -> Result<RecordListing> {
        let benchmarks = self.records()?;
        let metrics = aggregate(&benchmarks);
        Ok(RecordListing {
            count: benchmarks.len(),
            benchmarks,
            metrics,
        })
    }

    /// The record with `session_id`, if any.
    ///
    /// When several artifacts carry the same session the newest wins.
    pub fn get_record(&self, session_id: &str) -> Result<Option<BenchmarkRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|record| record.session_id == session_id))
    }

    /// Aggregate over all records.
    pub fn aggregate_metrics(&self) -> Result<AggregateMetrics> {
        Ok(aggregate(&self.records()?))
    }

    /// Run summaries, newest start time first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        Ok(group_into_runs(self.records()?)
            .iter()
            .map(RunGroup::summary)
            .collect())
    }

    /// The run with `run_id`, including its records.
    pub fn get_run(&self, run_id: &str) -> Result<Option<RunGroup>> {
        Ok(group_into_runs(self.records()?)
            .into_iter()
            .find(|group| group.run_id == run_id))
    }

    /// Raw artifacts, newest first.
    pub fn list_files(&self) -> Result<Vec<ReportFile>> {
        scanner::discover(&self.dir)
    }

    /// The newest record together with the newest run summary text.
    ///
    /// Summaries that cannot be read are logged and the next newest is used.
    pub fn latest(&self) -> Result<LatestBenchmark> {
        let record = self.records()?.into_iter().next();
        let summary = scanner::discover_summaries(&self.dir)?
            .into_iter()
            .find_map(|file| match scanner::read_summary(&file) {
                Ok(text) => Some((file, text)),
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Skipping run summary");
                    None
                }
            });
        let (summary_file, summary) = summary.unzip();

        Ok(LatestBenchmark {
            record,
            summary_file,
            summary,
        })
    }

    /// The latest `limit` records as history entries.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        Ok(recent_history(&self.records()?, limit))
    }
}
