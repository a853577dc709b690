//! Turns a shard's unioned event rows into per-user token sequences.

use chrono::Duration;

use crate::types::{EpochMillis, TokenId, UserId};

/// One tokenized event attributed to a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    /// Normalized user id.
    pub user_id: UserId,
    /// Event time in epoch milliseconds.
    pub timestamp: EpochMillis,
    /// Resolved token id, already OOV-substituted.
    pub token_id: TokenId,
}

/// A user's full event history within one shard, in timestamp order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSequence {
    /// The user owning this sequence.
    pub user_id: UserId,
    /// Token ids in event order.
    pub sequence: Vec<TokenId>,
    /// Timestamps aligned index-for-index with `sequence`.
    pub timestamps: Vec<EpochMillis>,
}

impl UserSequence {
    /// Number of events in the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True when the sequence holds no events.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Aggregated output for one shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardAggregate {
    /// Per-user sequences ordered by user id.
    pub sequences: Vec<UserSequence>,
    /// Total event rows folded into the sequences.
    pub row_count: usize,
    /// Largest timestamp observed in the shard.
    pub max_timestamp: EpochMillis,
    /// Train/validation boundary: `max_timestamp` minus the cutoff window.
    ///
    /// Reported for downstream splitting; nothing in this pipeline filters
    /// on it.
    pub cutoff: EpochMillis,
}

/// Collapses event rows into ordered per-user sequences.
///
/// Sorting is stable on `(user_id, timestamp)`, so rows that share both keys
/// keep their union order: domains in configured order, files in sorted path
/// order, rows in file order. That is what makes re-runs reproduce identical
/// artifacts.
#[derive(Clone, Copy, Debug)]
pub struct SequenceAggregator {
    cutoff_window_days: i64,
}

impl SequenceAggregator {
    /// Creates an aggregator with the given cutoff window in days.
    pub fn new(cutoff_window_days: i64) -> Self {
        Self { cutoff_window_days }
    }

    /// Sorts, groups, and summarizes one shard's rows.
    ///
    /// Returns `None` for an empty union, which is a normal outcome for a
    /// shard no user hashed into.
    pub fn aggregate(&self, mut rows: Vec<EventRow>) -> Option<ShardAggregate> {
        if rows.is_empty() {
            return None;
        }

        rows.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });

        let row_count = rows.len();
        let mut max_timestamp = EpochMillis::MIN;
        let mut sequences: Vec<UserSequence> = Vec::new();
        let mut current: Option<UserSequence> = None;

        for row in rows {
            max_timestamp = max_timestamp.max(row.timestamp);
            match current.as_mut() {
                Some(open) if open.user_id == row.user_id => {
                    open.sequence.push(row.token_id);
                    open.timestamps.push(row.timestamp);
                }
                _ => {
                    if let Some(done) = current.take() {
                        sequences.push(done);
                    }
                    current = Some(UserSequence {
                        user_id: row.user_id,
                        sequence: vec![row.token_id],
                        timestamps: vec![row.timestamp],
                    });
                }
            }
        }
        if let Some(done) = current.take() {
            sequences.push(done);
        }

        let cutoff = max_timestamp - Duration::days(self.cutoff_window_days).num_milliseconds();
        Some(ShardAggregate {
            sequences,
            row_count,
            max_timestamp,
            cutoff,
        })
    }
}
