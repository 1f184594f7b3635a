// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Report store scanning.
//!
//! Artifacts live flat in one directory and are picked up by file name:
//! `benchmark_*.json` for individual records and `benchmark_report_*.json`
//! for multi-client reports. The second pattern is a subset of the first, so
//! every file is visited once. Plain-text run summaries sit next to them as
//! `benchmark_summary_*.txt`. Results are ordered newest modification time
//! first; "latest N" queries depend on that order.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{ReportError, Result};
use crate::record::RawReportBody;

static RECORD_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^benchmark_.*\.json$").expect("valid record file pattern"));

static REPORT_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^benchmark_report_.*\.json$").expect("valid report file pattern"));

static SUMMARY_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^benchmark_summary_.*\.txt$").expect("valid summary file pattern"));

/// Whether `name` follows either artifact naming convention.
pub fn is_artifact_name(name: &str) -> bool {
    RECORD_FILE.is_match(name) || REPORT_FILE.is_match(name)
}

/// Whether `name` is a plain-text run summary.
pub fn is_summary_name(name: &str) -> bool {
    SUMMARY_FILE.is_match(name)
}

/// A raw artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFile {
    /// File name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// A parsed artifact with its provenance.
#[derive(Debug, Clone)]
pub struct RawReport {
    /// Where it came from.
    pub file: ReportFile,
    /// What it contained.
    pub body: RawReportBody,
}

/// List artifacts in `dir`, newest first.
///
/// A missing directory yields no artifacts. Ties on modification time are
/// broken by file name so the order is stable.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the directory exists but cannot be listed.
pub fn discover(dir: impl AsRef<Path>) -> Result<Vec<ReportFile>> {
    list_matching(dir.as_ref(), is_artifact_name)
}

/// List run summary files in `dir`, newest first.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the directory exists but cannot be listed.
pub fn discover_summaries(dir: impl AsRef<Path>) -> Result<Vec<ReportFile>> {
    list_matching(dir.as_ref(), is_summary_name)
}

fn list_matching(dir: &Path, accept: fn(&str) -> bool) -> Result<Vec<ReportFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Report directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ReportError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReportError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !accept(&name) {
            continue;
        }

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Skipping unreadable artifact");
                continue;
            }
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));

        files.push(ReportFile {
            name,
            path,
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

/// Read and parse a single artifact.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be read and
/// [`ReportError::Parse`] if its content is not a recognizable artifact.
pub fn read_report(file: &ReportFile) -> Result<RawReport> {
    let contents = fs::read_to_string(&file.path).map_err(|e| ReportError::io(&file.path, e))?;
    let body = RawReportBody::parse(&file.name, &contents)?;
    Ok(RawReport {
        file: file.clone(),
        body,
    })
}

/// Read a run summary as text.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be read.
pub fn read_summary(file: &ReportFile) -> Result<String> {
    fs::read_to_string(&file.path).map_err(|e| ReportError::io(&file.path, e))
}

/// Read every artifact in `dir`, newest first.
///
/// Artifacts that cannot be read or parsed are logged and skipped.
///
/// # Errors
///
/// Fails only when the directory itself cannot be listed.
pub fn scan(dir: impl AsRef<Path>) -> Result<Vec<RawReport>> {
    let files = discover(dir)?;
    let total = files.len();

    let reports: Vec<RawReport> = files
        .iter()
        .filter_map(|file| match read_report(file) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Skipping artifact");
                None
            }
        })
        .collect();

    tracing::info!(found = total, parsed = reports.len(), "Scanned report directory");
    Ok(reports)
}
