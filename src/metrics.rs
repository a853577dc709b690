use std::collections::HashMap;

use serde::Serialize;

use crate::types::ShardId;

/// Aggregate skew metrics for per-shard user counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShardSkew {
    pub total: usize,
    pub shards: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub max_share: f64,
    pub min_share: f64,
    pub ratio: f64,
    pub per_shard: Vec<ShardShare>,
}

/// Per-shard share of a run's users for skew inspection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShardShare {
    pub shard_id: ShardId,
    pub count: usize,
    pub share: f64,
}

/// Compute skew metrics from per-shard user counts.
/// Only shards that published an artifact appear in the map.
pub fn shard_skew(counts: &HashMap<ShardId, usize>) -> Option<ShardSkew> {
    if counts.is_empty() {
        return None;
    }
    let total: usize = counts.values().sum();
    let shards = counts.len();
    let min = *counts.values().min().expect("counts non-empty");
    let max = *counts.values().max().expect("counts non-empty");
    let mean = total as f64 / shards as f64;
    let max_share = if total == 0 {
        0.0
    } else {
        max as f64 / total as f64
    };
    let min_share = if total == 0 {
        0.0
    } else {
        min as f64 / total as f64
    };
    let ratio = if min == 0 {
        f64::INFINITY
    } else {
        max as f64 / min as f64
    };
    let mut per_shard: Vec<ShardShare> = counts
        .iter()
        .map(|(shard_id, count)| ShardShare {
            shard_id: *shard_id,
            count: *count,
            share: if total == 0 {
                0.0
            } else {
                *count as f64 / total as f64
            },
        })
        .collect();
    per_shard.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.shard_id.cmp(&b.shard_id))
    });
    Some(ShardSkew {
        total,
        shards,
        min,
        max,
        mean,
        max_share,
        min_share,
        ratio,
        per_shard,
    })
}
