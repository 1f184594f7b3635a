// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark record types.
//!
//! Two on-disk shapes exist. A single-record file holds one client
//! execution; a multi-client report wraps an ordered `client_results` list of
//! single-record-shaped entries under a run identifier. Both are decoded into
//! typed raw structs here and turned into [`BenchmarkRecord`]s by
//! [`crate::normalize`].
//!
//! Decoding is lenient below the top level: a field of the wrong type reads
//! as absent instead of failing the whole artifact.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReportError, Result};

/// Key whose presence marks a multi-client report.
pub const CLIENT_RESULTS_KEY: &str = "client_results";

/// Zero-knowledge proof timings and circuit statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkpMetrics {
    /// Circuit setup time.
    pub setup_time_ms: f64,
    /// Witness generation time.
    pub witness_generation_time_ms: f64,
    /// Proof generation time.
    pub proof_generation_time_ms: f64,
    /// Proof verification time.
    pub proof_verification_time_ms: f64,
    /// Serialized proof size.
    pub proof_size_bytes: u64,
    /// Number of circuit constraints.
    pub circuit_constraints: u64,
    /// Number of advice columns.
    pub circuit_advice_columns: u64,
    /// Number of fixed columns.
    pub circuit_fixed_columns: u64,
    /// Folding iterations performed.
    pub folding_iterations: u64,
}

impl ZkpMetrics {
    /// Setup + witness + proof generation + verification time.
    pub fn total_time_ms(&self) -> f64 {
        self.setup_time_ms
            + self.witness_generation_time_ms
            + self.proof_generation_time_ms
            + self.proof_verification_time_ms
    }
}

/// Local model training statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingMetrics {
    /// Number of training samples.
    pub dataset_size: u64,
    /// Number of input features.
    pub num_features: u64,
    /// Training wall time.
    pub training_time_ms: f64,
    /// Epochs actually run.
    pub epochs_completed: u64,
    /// Loss after the last epoch.
    pub final_loss: f64,
    /// Loss before the first epoch.
    pub initial_loss: f64,
    /// Epoch at which the loss converged, if it did.
    pub convergence_epoch: Option<u64>,
    /// Loss per epoch, in order.
    pub loss_history: Vec<f64>,
}

/// Deserialize `T`, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// One client execution as found on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Unique id of the client execution.
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    /// Client name.
    #[serde(default, deserialize_with = "lenient")]
    pub client_id: Option<String>,
    /// Explicit scenario name.
    #[serde(default, deserialize_with = "lenient")]
    pub scenario: Option<String>,
    /// Client count recorded by the workload.
    #[serde(default, deserialize_with = "lenient")]
    pub num_clients: Option<u32>,
    /// Execution start.
    #[serde(default, deserialize_with = "lenient")]
    pub start_time: Option<DateTime<Utc>>,
    /// Execution end.
    #[serde(default, deserialize_with = "lenient")]
    pub end_time: Option<DateTime<Utc>>,
    /// Total wall time.
    #[serde(default, deserialize_with = "lenient")]
    pub total_duration_ms: Option<f64>,
    /// Proof metrics subtree.
    #[serde(default, deserialize_with = "lenient")]
    pub zkp_metrics: Option<ZkpMetrics>,
    /// Training metrics subtree.
    #[serde(default, deserialize_with = "lenient")]
    pub training_metrics: Option<TrainingMetrics>,
    /// Resource snapshots.
    #[serde(default, deserialize_with = "lenient")]
    pub system_metrics: Option<Vec<Map<String, Value>>>,
    /// Whether the client reported success.
    #[serde(default, deserialize_with = "lenient")]
    pub success: Option<bool>,
    /// Failure reason reported by the client.
    #[serde(default, deserialize_with = "lenient")]
    pub error_message: Option<String>,
}

/// A run-level report with nested per-client results.
#[derive(Debug, Clone, Default)]
pub struct RawMultiClientReport {
    /// Run identifier (`benchmark_id` on disk).
    pub benchmark_id: Option<String>,
    /// Declared number of clients.
    pub num_clients: Option<u32>,
    /// Per-client entries, in file order. An entry that is not an object
    /// is kept as an empty record.
    pub client_results: Vec<RawRecord>,
}

/// Raw artifact content, discriminated by the presence of `client_results`.
#[derive(Debug, Clone)]
pub enum RawReportBody {
    /// One client execution.
    Single(RawRecord),
    /// A multi-client run report.
    MultiClient(RawMultiClientReport),
}

impl RawReportBody {
    /// Parse artifact `contents` read from the file called `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Parse`] when the text is not JSON, the top
    /// level is not an object, a single record has no `session_id`, or
    /// `client_results` is not a list.
    pub fn parse(file: &str, contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| ReportError::parse(file, e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(ReportError::parse(file, "top-level value is not an object"));
        };

        match object.remove(CLIENT_RESULTS_KEY) {
            Some(Value::Array(entries)) => {
                let client_results = entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, entry)| {
                        serde_json::from_value(entry).unwrap_or_else(|e| {
                            tracing::warn!(
                                file,
                                index,
                                error = %e,
                                "Malformed client entry, keeping it with zero-valued metrics"
                            );
                            RawRecord::default()
                        })
                    })
                    .collect();

                Ok(RawReportBody::MultiClient(RawMultiClientReport {
                    benchmark_id: object
                        .remove("benchmark_id")
                        .and_then(|v| serde_json::from_value(v).ok()),
                    num_clients: object
                        .remove("num_clients")
                        .and_then(|v| serde_json::from_value(v).ok()),
                    client_results,
                }))
            }
            Some(_) => Err(ReportError::parse(
                file,
                format!("'{CLIENT_RESULTS_KEY}' is not a list"),
            )),
            None => {
                let record: RawRecord = serde_json::from_value(Value::Object(object))
                    .map_err(|e| ReportError::parse(file, e.to_string()))?;
                if record.session_id.is_none() {
                    return Err(ReportError::parse(file, "missing required key 'session_id'"));
                }
                Ok(RawReportBody::Single(record))
            }
        }
    }
}

/// Canonical, normalized benchmark record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Unique id of the client execution.
    pub session_id: String,
    /// Parent run, for records that came from a multi-client report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    /// Client name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Scenario name; never empty.
    pub scenario: String,
    /// Number of clients in the run (at least 1).
    pub num_clients: u32,
    /// Execution start, if present and parsable.
    pub start_time: Option<DateTime<Utc>>,
    /// Execution end, if present and parsable.
    pub end_time: Option<DateTime<Utc>>,
    /// Total wall time.
    pub total_duration_ms: f64,
    /// Proof metrics (zero-valued when absent).
    pub zkp_metrics: ZkpMetrics,
    /// Training metrics (zero-valued when absent).
    pub training_metrics: TrainingMetrics,
    /// Resource snapshots, in order.
    pub system_metrics: Vec<Map<String, Value>>,
    /// Whether the client reported success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Failure reason reported by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Source artifact name.
    pub filename: String,
    /// Source artifact modification time.
    pub file_mtime: DateTime<Utc>,
}

impl BenchmarkRecord {
    /// Identifier of the run this record belongs to.
    pub fn run_id(&self) -> &str {
        self.report_id.as_deref().unwrap_or(&self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record_is_detected() {
        let body = RawReportBody::parse(
            "benchmark_single_1.json",
            r#"{
                "session_id": "3f1c",
                "client_id": "client-1",
                "start_time": "2025-06-01T10:00:00Z",
                "total_duration_ms": 1500,
                "zkp_metrics": {"proof_generation_time_ms": 120, "proof_size_bytes": 2048},
                "training_metrics": {"final_loss": 0.25, "loss_history": [0.9, 0.5, 0.25]}
            }"#,
        )
        .unwrap();

        let RawReportBody::Single(record) = body else {
            panic!("expected a single record");
        };
        assert_eq!(record.session_id.as_deref(), Some("3f1c"));
        assert_eq!(record.total_duration_ms, Some(1500.0));
        assert_eq!(record.zkp_metrics.unwrap().proof_size_bytes, 2048);
        assert_eq!(record.training_metrics.unwrap().loss_history, vec![0.9, 0.5, 0.25]);
        assert!(record.start_time.is_some());
    }

    #[test]
    fn test_multi_client_report_is_detected() {
        let body = RawReportBody::parse(
            "benchmark_report_1.json",
            r#"{
                "benchmark_id": "run-7",
                "num_clients": 2,
                "client_results": [{"session_id": "a"}, {"session_id": "b"}]
            }"#,
        )
        .unwrap();

        let RawReportBody::MultiClient(report) = body else {
            panic!("expected a multi-client report");
        };
        assert_eq!(report.benchmark_id.as_deref(), Some("run-7"));
        assert_eq!(report.num_clients, Some(2));
        assert_eq!(report.client_results.len(), 2);
    }

    #[test]
    fn test_wrongly_typed_fields_read_as_absent() {
        let body = RawReportBody::parse(
            "benchmark_x.json",
            r#"{
                "session_id": "s1",
                "start_time": "yesterday",
                "zkp_metrics": "corrupt",
                "training_metrics": {"final_loss": 0.5},
                "system_metrics": 42
            }"#,
        )
        .unwrap();

        let RawReportBody::Single(record) = body else {
            panic!("expected a single record");
        };
        assert!(record.start_time.is_none());
        assert!(record.zkp_metrics.is_none());
        assert!(record.system_metrics.is_none());
        assert!(record.training_metrics.is_some());
    }

    #[test]
    fn test_non_object_client_entry_is_kept_empty() {
        let body = RawReportBody::parse(
            "benchmark_report_2.json",
            r#"{"benchmark_id": "r", "client_results": [null, {"session_id": "b"}]}"#,
        )
        .unwrap();

        let RawReportBody::MultiClient(report) = body else {
            panic!("expected a multi-client report");
        };
        assert_eq!(report.client_results.len(), 2);
        assert!(report.client_results[0].session_id.is_none());
        assert!(report.client_results[0].zkp_metrics.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RawReportBody::parse("f.json", "{not json"),
            Err(ReportError::Parse { .. })
        ));
        assert!(matches!(
            RawReportBody::parse("f.json", "[1, 2]"),
            Err(ReportError::Parse { .. })
        ));
        assert!(matches!(
            RawReportBody::parse("f.json", r#"{"client_results": {"a": 1}}"#),
            Err(ReportError::Parse { .. })
        ));

        let err = RawReportBody::parse("f.json", r#"{"zkp_metrics": {}}"#).unwrap_err();
        assert!(err.to_string().contains("session_id"));
    }

    #[test]
    fn test_zkp_total_time() {
        let zkp = ZkpMetrics {
            setup_time_ms: 1.0,
            witness_generation_time_ms: 2.0,
            proof_generation_time_ms: 3.0,
            proof_verification_time_ms: 4.0,
            ..Default::default()
        };
        assert_eq!(zkp.total_time_ms(), 10.0);
    }
}
