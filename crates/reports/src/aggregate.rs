// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cross-record statistics and run grouping.
//!
//! The averages in [`AggregateMetrics`] share one denominator: the number of
//! records in the input. A record that has, say, training metrics but no
//! proof metrics still counts towards the proof averages with a zero, and a
//! record with no metrics at all counts towards every average.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::record::BenchmarkRecord;

/// Summary statistics over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Number of records in the input.
    pub total_benchmarks: usize,
    /// Mean proof generation time, ms.
    pub avg_proof_time: f64,
    /// Mean proof verification time, ms.
    pub avg_verify_time: f64,
    /// Mean training time, ms.
    pub avg_training_time: f64,
    /// Mean final training loss.
    pub avg_final_loss: f64,
    /// Mean proof size, bytes.
    pub avg_proof_size: f64,
    /// Mean total duration, ms.
    #[serde(rename = "total_duration")]
    pub avg_total_duration: f64,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Reduce `records` to [`AggregateMetrics`].
///
/// Means are rounded to two decimal places, the final loss to four. An
/// empty input gives the all-zero value.
pub fn aggregate(records: &[BenchmarkRecord]) -> AggregateMetrics {
    if records.is_empty() {
        return AggregateMetrics::default();
    }

    let mut proof = 0.0;
    let mut verify = 0.0;
    let mut training = 0.0;
    let mut loss = 0.0;
    let mut size = 0.0;
    let mut duration = 0.0;

    for record in records {
        proof += record.zkp_metrics.proof_generation_time_ms;
        verify += record.zkp_metrics.proof_verification_time_ms;
        training += record.training_metrics.training_time_ms;
        loss += record.training_metrics.final_loss;
        size += record.zkp_metrics.proof_size_bytes as f64;
        duration += record.total_duration_ms;
    }

    let count = records.len() as f64;

    AggregateMetrics {
        total_benchmarks: records.len(),
        avg_proof_time: round_to(proof / count, 2),
        avg_verify_time: round_to(verify / count, 2),
        avg_training_time: round_to(training / count, 2),
        avg_final_loss: round_to(loss / count, 4),
        avg_proof_size: round_to(size / count, 2),
        avg_total_duration: round_to(duration / count, 2),
    }
}

/// Records that belong to one logical run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunGroup {
    /// The shared `report_id`, or the record's `session_id`.
    pub run_id: String,
    /// Scenario of the first record.
    pub scenario: String,
    /// Start time of the first record that has one.
    pub start_time: Option<DateTime<Utc>>,
    /// Declared client count.
    pub num_clients: u32,
    /// Distinct client ids, in first-seen order.
    pub client_ids: Vec<String>,
    /// Member records, in discovery order.
    pub records: Vec<BenchmarkRecord>,
}

impl RunGroup {
    fn new(record: &BenchmarkRecord) -> Self {
        Self {
            run_id: record.run_id().to_string(),
            scenario: record.scenario.clone(),
            start_time: record.start_time,
            num_clients: record.num_clients,
            client_ids: Vec::new(),
            records: Vec::new(),
        }
    }

    fn push(&mut self, record: BenchmarkRecord) {
        if self.start_time.is_none() {
            self.start_time = record.start_time;
        }
        if let Some(client_id) = &record.client_id {
            if !self.client_ids.contains(client_id) {
                self.client_ids.push(client_id.clone());
            }
        }
        self.records.push(record);
    }

    /// Serializable view without the member records.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            scenario: self.scenario.clone(),
            start_time: self.start_time,
            num_clients: self.num_clients,
            client_ids: self.client_ids.clone(),
            record_count: self.records.len(),
        }
    }
}

/// What the run listing reports for each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Run start, if known.
    pub start_time: Option<DateTime<Utc>>,
    /// Declared client count.
    pub num_clients: u32,
    /// Distinct client ids seen.
    pub client_ids: Vec<String>,
    /// Number of records in the run.
    pub record_count: usize,
}

/// Partition `records` into runs, newest start time first.
///
/// Records sharing a `report_id` form one run; a record without one is a
/// run of its own keyed by `session_id`. Runs without a start time sort
/// last. Runs with equal start times keep first-seen order.
pub fn group_into_runs(records: Vec<BenchmarkRecord>) -> Vec<RunGroup> {
    let mut groups: Vec<RunGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let slot = match index.get(record.run_id()) {
            Some(&slot) => slot,
            None => {
                groups.push(RunGroup::new(&record));
                index.insert(record.run_id().to_string(), groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].push(record);
    }

    groups.sort_by(|a, b| match (a.start_time, b.start_time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TrainingMetrics, ZkpMetrics};
    use chrono::TimeZone;

    fn record(session: &str, report: Option<&str>) -> BenchmarkRecord {
        BenchmarkRecord {
            session_id: session.to_string(),
            report_id: report.map(str::to_string),
            client_id: None,
            scenario: "single-client".to_string(),
            num_clients: 1,
            start_time: None,
            end_time: None,
            total_duration_ms: 0.0,
            zkp_metrics: ZkpMetrics::default(),
            training_metrics: TrainingMetrics::default(),
            system_metrics: Vec::new(),
            success: None,
            error_message: None,
            filename: "benchmark_single_1.json".to_string(),
            file_mtime: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_empty_is_all_zero() {
        let metrics = aggregate(&[]);
        assert_eq!(metrics, AggregateMetrics::default());
        assert_eq!(metrics.total_benchmarks, 0);
    }

    #[test]
    fn test_means_are_rounded() {
        let mut a = record("a", None);
        a.zkp_metrics.proof_generation_time_ms = 100.0;
        a.zkp_metrics.proof_verification_time_ms = 10.0;
        a.zkp_metrics.proof_size_bytes = 1000;
        a.training_metrics.training_time_ms = 50.0;
        a.training_metrics.final_loss = 0.12345;
        a.total_duration_ms = 1000.0;

        let mut b = record("b", None);
        b.zkp_metrics.proof_generation_time_ms = 200.0;
        b.zkp_metrics.proof_verification_time_ms = 20.0;
        b.zkp_metrics.proof_size_bytes = 2001;
        b.training_metrics.training_time_ms = 51.0;
        b.training_metrics.final_loss = 0.2;
        b.total_duration_ms = 3000.0;

        let mut c = record("c", None);
        c.zkp_metrics.proof_generation_time_ms = 0.01;

        let metrics = aggregate(&[a, b, c]);
        assert_eq!(metrics.total_benchmarks, 3);
        assert_eq!(metrics.avg_proof_time, 100.0);
        assert_eq!(metrics.avg_verify_time, 10.0);
        assert_eq!(metrics.avg_training_time, 33.67);
        assert_eq!(metrics.avg_final_loss, 0.1078);
        assert_eq!(metrics.avg_proof_size, 1000.33);
        assert_eq!(metrics.avg_total_duration, 1333.33);
    }

    #[test]
    fn test_shared_denominator_skews_sparse_fields() {
        // Only one of two records has training metrics, yet the training
        // mean is halved because both records count.
        let mut with_training = record("a", None);
        with_training.training_metrics.training_time_ms = 100.0;
        let mut proof_only = record("b", None);
        proof_only.zkp_metrics.proof_generation_time_ms = 40.0;

        let metrics = aggregate(&[with_training, proof_only]);
        assert_eq!(metrics.avg_training_time, 50.0);
        assert_eq!(metrics.avg_proof_time, 20.0);
    }

    #[test]
    fn test_records_without_metrics_count_in_every_mean() {
        let mut a = record("a", None);
        a.total_duration_ms = 10.0;
        a.zkp_metrics.proof_generation_time_ms = 100.0;
        let empty = record("b", None);

        let metrics = aggregate(&[a, empty.clone()]);
        assert_eq!(metrics.total_benchmarks, 2);
        assert_eq!(metrics.avg_total_duration, 5.0);
        assert_eq!(metrics.avg_proof_time, 50.0);

        let metrics = aggregate(&[empty]);
        assert_eq!(metrics.total_benchmarks, 1);
        assert_eq!(metrics.avg_total_duration, 0.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(AggregateMetrics::default()).unwrap();
        assert!(value.get("total_duration").is_some());
        assert!(value.get("avg_total_duration").is_none());
        assert!(value.get("avg_proof_time").is_some());
    }

    #[test]
    fn test_grouping_is_a_partition() {
        let records = vec![
            record("s1", Some("r1")),
            record("s2", None),
            record("s3", Some("r1")),
            record("s4", Some("r2")),
            record("s5", None),
        ];

        let groups = group_into_runs(records.clone());
        assert_eq!(groups.len(), 4);

        let mut seen: Vec<String> = groups
            .iter()
            .flat_map(|g| g.records.iter().map(|r| r.session_id.clone()))
            .collect();
        seen.sort();
        let mut expected: Vec<String> = records.iter().map(|r| r.session_id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        let r1 = groups.iter().find(|g| g.run_id == "r1").unwrap();
        let order: Vec<_> = r1.records.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(order, vec!["s1", "s3"]);
    }

    #[test]
    fn test_runs_sorted_newest_first_missing_last() {
        let mut old = record("old", None);
        old.start_time = at(8);
        let undated = record("undated", None);
        let mut new = record("new", Some("run-new"));
        new.start_time = at(12);

        let ids: Vec<_> = group_into_runs(vec![old, undated, new])
            .into_iter()
            .map(|g| g.run_id)
            .collect();
        assert_eq!(ids, vec!["run-new", "old", "undated"]);
    }

    #[test]
    fn test_group_fields() {
        let mut first = record("a", Some("run"));
        first.client_id = Some("client-0".to_string());
        first.num_clients = 3;
        first.scenario = "multi-client".to_string();
        let mut second = record("b", Some("run"));
        second.client_id = Some("client-1".to_string());
        second.start_time = at(9);
        let mut third = record("c", Some("run"));
        third.client_id = Some("client-0".to_string());

        let groups = group_into_runs(vec![first, second, third]);
        assert_eq!(groups.len(), 1);

        let summary = groups[0].summary();
        assert_eq!(summary.run_id, "run");
        assert_eq!(summary.scenario, "multi-client");
        assert_eq!(summary.num_clients, 3);
        assert_eq!(summary.start_time, at(9));
        assert_eq!(summary.client_ids, vec!["client-0", "client-1"]);
        assert_eq!(summary.record_count, 3);
    }
}
