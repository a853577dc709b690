//! Deterministic assignment of users to shards.

use crate::errors::PipelineError;
use crate::hash::stable_user_hash;
use crate::types::ShardId;

/// Pure mapping from a user id to the shard that owns it.
///
/// The assignment depends only on the user id and the shard count, never on
/// which files have been scanned or in what order, so every scan pass and
/// every re-run agrees on where a user's events belong. The same value serves
/// as the scan predicate (keep only rows this shard owns) and as the
/// verification predicate (confirm an artifact holds no foreign users).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardPartitioner {
    num_shards: usize,
}

impl ShardPartitioner {
    /// Creates a partitioner over `num_shards` shards.
    ///
    /// Fails when `num_shards` is zero, since a modulus of zero has no
    /// meaningful assignment.
    pub fn new(num_shards: usize) -> Result<Self, PipelineError> {
        if num_shards == 0 {
            return Err(PipelineError::Configuration(
                "num_shards must be at least 1".to_string(),
            ));
        }
        Ok(Self { num_shards })
    }

    /// Returns the shard that owns `user_id`.
    pub fn shard_of(&self, user_id: &str) -> ShardId {
        stable_user_hash(user_id) as ShardId % self.num_shards
    }

    /// Reports whether `shard_id` owns `user_id`.
    pub fn owns(&self, shard_id: ShardId, user_id: &str) -> bool {
        self.shard_of(user_id) == shard_id
    }

    /// The configured shard count.
    pub fn num_shards(&self) -> usize {
        self.num_shards
    }

    /// All shard ids, in ascending order.
    ///
    /// ```text
    /// for shard_id in partitioner.shard_ids() { ... }
    /// ```
    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> {
        0..self.num_shards
    }
}
