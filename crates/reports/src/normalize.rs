// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Normalization of raw artifacts into [`BenchmarkRecord`]s.

use crate::record::{BenchmarkRecord, RawRecord, RawReportBody};
use crate::scanner::{RawReport, ReportFile};

/// Scenario used when none is recorded and none can be inferred.
pub const UNKNOWN_SCENARIO: &str = "unknown";

/// Run identifier for multi-client reports that carry none.
pub const UNKNOWN_REPORT_ID: &str = "unknown";

/// Guess a scenario from an artifact file name.
///
/// Matching is case-insensitive and `multi` is checked before `single`.
pub fn infer_scenario(filename: &str) -> &'static str {
    let name = filename.to_ascii_lowercase();
    if name.contains("multi") {
        "multi-client"
    } else if name.contains("single") {
        "single-client"
    } else {
        UNKNOWN_SCENARIO
    }
}

/// Turn one raw artifact into canonical records.
///
/// A single-record file yields exactly one record. A multi-client report
/// yields one record per `client_results` entry, each carrying the report's
/// run identifier and client count. Malformed entries are kept with
/// zero-valued metrics.
pub fn normalize(report: RawReport) -> Vec<BenchmarkRecord> {
    let RawReport { file, body } = report;

    match body {
        RawReportBody::Single(raw) => {
            let session_id = raw.session_id.clone().unwrap_or_default();
            let num_clients = raw.num_clients;
            vec![build(raw, session_id, None, num_clients, &file)]
        }
        RawReportBody::MultiClient(multi) => {
            let report_id = multi
                .benchmark_id
                .unwrap_or_else(|| UNKNOWN_REPORT_ID.to_string());
            let num_clients = Some(multi.num_clients.unwrap_or(1));

            multi
                .client_results
                .into_iter()
                .enumerate()
                .map(|(index, raw)| {
                    let session_id = raw
                        .session_id
                        .clone()
                        .unwrap_or_else(|| format!("{report_id}-client-{index}"));
                    build(raw, session_id, Some(report_id.clone()), num_clients, &file)
                })
                .collect()
        }
    }
}

/// Normalize every artifact, preserving artifact order.
pub fn normalize_all(reports: impl IntoIterator<Item = RawReport>) -> Vec<BenchmarkRecord> {
    reports.into_iter().flat_map(normalize).collect()
}

fn build(
    raw: RawRecord,
    session_id: String,
    report_id: Option<String>,
    num_clients: Option<u32>,
    file: &ReportFile,
) -> BenchmarkRecord {
    let scenario = raw
        .scenario
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| infer_scenario(&file.name).to_string());

    BenchmarkRecord {
        session_id,
        report_id,
        client_id: raw.client_id,
        scenario,
        num_clients: num_clients.unwrap_or(1).max(1),
        start_time: raw.start_time,
        end_time: raw.end_time,
        total_duration_ms: raw.total_duration_ms.unwrap_or(0.0).max(0.0),
        zkp_metrics: raw.zkp_metrics.unwrap_or_default(),
        training_metrics: raw.training_metrics.unwrap_or_default(),
        system_metrics: raw.system_metrics.unwrap_or_default(),
        success: raw.success,
        error_message: raw.error_message,
        filename: file.name.clone(),
        file_mtime: file.modified,
    }
}
