// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown rendering of benchmark summaries.

use chrono::{DateTime, Utc};
use std::fmt::{self, Write};

use crate::aggregate::{aggregate, group_into_runs, AggregateMetrics, RunSummary};
use crate::record::BenchmarkRecord;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Generate a markdown summary of `records`: aggregate metrics, runs and
/// one row per record.
pub fn generate_summary(records: &[BenchmarkRecord]) -> String {
    let metrics = aggregate(records);
    let runs: Vec<RunSummary> = group_into_runs(records.to_vec())
        .iter()
        .map(|group| group.summary())
        .collect();

    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = render_summary(&mut output, &metrics, &runs, records);
    output
}

fn render_summary(
    out: &mut String,
    metrics: &AggregateMetrics,
    runs: &[RunSummary],
    records: &[BenchmarkRecord],
) -> fmt::Result {
    writeln!(out, "# Benchmark Summary")?;
    writeln!(out)?;
    writeln!(out, "Generated: {}", Utc::now().to_rfc3339())?;
    writeln!(out)?;

    writeln!(out, "## Aggregate Metrics")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|--------|-------|")?;
    writeln!(out, "| Benchmarks | {} |", metrics.total_benchmarks)?;
    writeln!(out, "| Avg proof time (ms) | {:.2} |", metrics.avg_proof_time)?;
    writeln!(out, "| Avg verify time (ms) | {:.2} |", metrics.avg_verify_time)?;
    writeln!(out, "| Avg training time (ms) | {:.2} |", metrics.avg_training_time)?;
    writeln!(out, "| Avg final loss | {:.4} |", metrics.avg_final_loss)?;
    writeln!(out, "| Avg proof size (bytes) | {:.2} |", metrics.avg_proof_size)?;
    writeln!(out, "| Avg total duration (ms) | {:.2} |", metrics.avg_total_duration)?;
    writeln!(out)?;

    writeln!(out, "## Runs")?;
    writeln!(out)?;
    writeln!(out, "| Run ID | Scenario | Started | Clients | Records |")?;
    writeln!(out, "|--------|----------|---------|---------|---------|")?;
    for run in runs {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            run.run_id,
            run.scenario,
            format_time(run.start_time),
            run.num_clients,
            run.record_count
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Records")?;
    writeln!(out)?;
    writeln!(out, "| Session ID | Client | Scenario | Proof (ms) | Final loss | File |")?;
    writeln!(out, "|------------|--------|----------|------------|------------|------|")?;
    for record in records {
        writeln!(
            out,
            "| {} | {} | {} | {:.2} | {:.4} | {} |",
            record.session_id,
            record.client_id.as_deref().unwrap_or("-"),
            record.scenario,
            record.zkp_metrics.proof_generation_time_ms,
            record.training_metrics.final_loss,
            record.filename
        )?;
    }

    writeln!(out)?;
    writeln!(out, "---")?;
    writeln!(out, "Total benchmarks: {}", records.len())?;
    Ok(())
}
