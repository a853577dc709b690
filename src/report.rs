//! Accounting produced by a pipeline run.
//!
//! The orchestrator returns a [`RunReport`] instead of printing anything
//! itself, so callers decide whether to log it, serialize it, or fail the
//! process on partial results.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use serde::Serialize;

use crate::errors::PipelineError;
use crate::metrics::ShardSkew;
use crate::types::{EpochMillis, ShardId};
use crate::vocab::OovStats;

/// Outcome of one successfully published shard.
#[derive(Clone, Debug, Serialize)]
pub struct ShardReport {
    /// The shard this report covers.
    pub shard_id: ShardId,
    /// Users with at least one event in the shard.
    pub users: usize,
    /// Event rows folded into the shard's sequences.
    pub rows: usize,
    /// Newest event timestamp in the shard, epoch milliseconds.
    pub max_timestamp: EpochMillis,
    /// Train/validation boundary derived from `max_timestamp`.
    pub cutoff: EpochMillis,
    /// Published artifact path.
    pub path: PathBuf,
}

/// One shard that failed without stopping the run.
#[derive(Clone, Debug, Serialize)]
pub struct ShardFailure {
    /// The shard that failed.
    pub shard_id: ShardId,
    /// Rendered error message.
    pub error: String,
}

/// Full accounting for one run across every shard.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Configured shard count.
    pub num_shards: usize,
    /// Shards that published an artifact.
    pub shards_written: usize,
    /// Shards that owned no events, a normal outcome.
    pub shards_empty: usize,
    /// Shards that failed.
    pub shards_failed: usize,
    /// Users across all published shards.
    pub total_users: usize,
    /// Event rows across all published shards.
    pub total_rows: usize,
    /// Vocabulary lookup counters for the run.
    pub oov: OovStats,
    /// User-count balance across published shards.
    pub skew: Option<ShardSkew>,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_secs: f64,
    /// Per-shard success details, ordered by shard id.
    pub shards: Vec<ShardReport>,
    /// Per-shard failures, ordered by shard id.
    pub failures: Vec<ShardFailure>,
}

impl RunReport {
    /// True when at least one shard failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Serializes the report as pretty-printed JSON at `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self).map_err(|err| PipelineError::Artifact {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Renders epoch milliseconds as a UTC date-time for summaries.
///
/// Falls back to the raw millisecond value when it does not fit a calendar
/// date.
pub fn format_timestamp(millis: EpochMillis) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(moment) => moment.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{millis}ms"),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn minimal_report() -> RunReport {
        RunReport {
            num_shards: 2,
            shards_written: 1,
            shards_empty: 1,
            shards_failed: 0,
            total_users: 1,
            total_rows: 3,
            oov: OovStats {
                lookups: 3,
                misses: 1,
                rate: 1.0 / 3.0,
            },
            skew: None,
            elapsed_secs: 0.25,
            shards: vec![ShardReport {
                shard_id: 0,
                users: 1,
                rows: 3,
                max_timestamp: 100,
                cutoff: 100 - 2 * 86_400_000,
                path: PathBuf::from("shards/shard_0.parquet"),
            }],
            failures: Vec::new(),
        }
    }

    #[test]
    fn reports_without_failures_say_so() {
        let mut report = minimal_report();
        assert!(!report.has_failures());
        report.failures.push(ShardFailure {
            shard_id: 1,
            error: "boom".to_string(),
        });
        assert!(report.has_failures());
    }

    #[test]
    fn json_serialization_round_trips_through_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("report.json");
        minimal_report().write_json(&path).expect("write report");

        let raw = fs::read_to_string(&path).expect("read report");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(parsed["num_shards"], 2);
        assert_eq!(parsed["shards"][0]["shard_id"], 0);
        assert_eq!(parsed["oov"]["misses"], 1);
    }

    #[test]
    fn timestamps_render_as_utc_or_fall_back() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert!(format_timestamp(EpochMillis::MAX).ends_with("ms"));
    }
}
