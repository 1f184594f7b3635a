// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Compact per-record history for trend charts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::BenchmarkRecord;

/// Number of entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One point in the benchmark history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Record the entry was taken from.
    pub session_id: String,
    /// Record start time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Final training loss.
    pub final_loss: f64,
    /// Training time, ms.
    pub training_time: f64,
    /// Setup + witness + proof generation + verification, ms.
    pub total_zkp_time: f64,
    /// Proof size, bytes.
    pub proof_size: u64,
}

impl From<&BenchmarkRecord> for HistoryEntry {
    fn from(record: &BenchmarkRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            timestamp: record.start_time,
            final_loss: record.training_metrics.final_loss,
            training_time: record.training_metrics.training_time_ms,
            total_zkp_time: record.zkp_metrics.total_time_ms(),
            proof_size: record.zkp_metrics.proof_size_bytes,
        }
    }
}

/// The first `limit` records as history entries.
///
/// `records` is expected newest first, as produced by a scan.
pub fn recent_history(records: &[BenchmarkRecord], limit: usize) -> Vec<HistoryEntry> {
    records.iter().take(limit).map(HistoryEntry::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TrainingMetrics, ZkpMetrics};
    use chrono::TimeZone;

    fn record(session: &str) -> BenchmarkRecord {
        BenchmarkRecord {
            session_id: session.to_string(),
            report_id: None,
            client_id: None,
            scenario: "single-client".to_string(),
            num_clients: 1,
            start_time: Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()),
            end_time: None,
            total_duration_ms: 0.0,
            zkp_metrics: ZkpMetrics {
                setup_time_ms: 5.0,
                witness_generation_time_ms: 10.0,
                proof_generation_time_ms: 100.0,
                proof_verification_time_ms: 2.5,
                proof_size_bytes: 4096,
                ..Default::default()
            },
            training_metrics: TrainingMetrics {
                training_time_ms: 800.0,
                final_loss: 0.05,
                ..Default::default()
            },
            system_metrics: Vec::new(),
            success: Some(true),
            error_message: None,
            filename: format!("benchmark_{session}.json"),
            file_mtime: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_entry_fields() {
        let entry = HistoryEntry::from(&record("s"));
        assert_eq!(entry.total_zkp_time, 117.5);
        assert_eq!(entry.final_loss, 0.05);
        assert_eq!(entry.training_time, 800.0);
        assert_eq!(entry.proof_size, 4096);
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn test_limit_keeps_newest() {
        let records: Vec<_> = (0..15).map(|i| record(&format!("s{i}"))).collect();

        let history = recent_history(&records, DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].session_id, "s0");
        assert_eq!(history[9].session_id, "s9");

        assert_eq!(recent_history(&records[..3], 10).len(), 3);
        assert!(recent_history(&records, 0).is_empty());
    }
}
