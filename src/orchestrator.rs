//! Drives the per-shard fan-out over planned domains.
//!
//! Domains are planned once up front; after that each worker claims shard ids
//! from a shared counter, scans every plan for the rows its shard owns,
//! aggregates them, and publishes the artifact. A shard's event rows live
//! only while that shard is being built, so peak memory tracks the largest
//! shard rather than the whole dataset.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::SequenceAggregator;
use crate::config::PipelineConfig;
use crate::domain::{DomainPlan, DomainPlanner};
use crate::errors::PipelineError;
use crate::metrics::shard_skew;
use crate::partition::ShardPartitioner;
use crate::report::{RunReport, ShardFailure, ShardReport, format_timestamp};
use crate::types::ShardId;
use crate::vocab::VocabularyIndex;
use crate::writer::ShardWriter;

/// Runs the full pipeline for one configuration.
pub struct ShardOrchestrator {
    config: PipelineConfig,
}

impl ShardOrchestrator {
    /// Creates an orchestrator; nothing runs until [`run`](Self::run).
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration this orchestrator will run with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Plans every domain, then builds and publishes every shard.
    ///
    /// Configuration and planning problems fail fast. Problems inside a
    /// single shard are collected as [`ShardFailure`] entries instead, so one
    /// bad shard cannot take down the artifacts of forty-nine healthy ones.
    pub fn run(&self, vocabulary: &VocabularyIndex) -> Result<RunReport, PipelineError> {
        self.config.validate()?;
        let partitioner = ShardPartitioner::new(self.config.num_shards)?;
        let planner = DomainPlanner::new(&self.config.raw_dir);

        let mut plans: Vec<DomainPlan> = Vec::new();
        for (domain, prefix) in &self.config.domains {
            match planner.plan(domain, prefix)? {
                Some(plan) => {
                    info!(
                        domain = %plan.domain(),
                        files = plan.file_count(),
                        entity = plan.entity_column(),
                        "domain planned"
                    );
                    plans.push(plan);
                }
                None => info!(domain, "domain has no event files, skipped"),
            }
        }

        let aggregator = SequenceAggregator::new(self.config.cutoff_window_days);
        let writer = ShardWriter::new(&self.config.output_dir);
        let num_shards = self.config.num_shards;
        let worker_count = self.config.worker_threads.min(num_shards);
        let started = Instant::now();

        let next_shard = AtomicUsize::new(0);
        let outcomes: Mutex<HashMap<ShardId, Result<Option<ShardReport>, PipelineError>>> =
            Mutex::new(HashMap::new());

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(worker_count);
            for _ in 0..worker_count {
                handles.push(scope.spawn(|| {
                    loop {
                        let shard_id = next_shard.fetch_add(1, Ordering::SeqCst);
                        if shard_id >= num_shards {
                            break;
                        }
                        let outcome = build_shard(
                            shard_id,
                            &plans,
                            &partitioner,
                            vocabulary,
                            &aggregator,
                            &writer,
                        );
                        outcomes
                            .lock()
                            .expect("shard outcomes poisoned")
                            .insert(shard_id, outcome);
                    }
                }));
            }
            for handle in handles {
                if handle.join().is_err() {
                    warn!("shard worker panicked");
                }
            }
        });

        let mut outcomes = outcomes.into_inner().expect("shard outcomes poisoned");
        let mut shards: Vec<ShardReport> = Vec::new();
        let mut failures: Vec<ShardFailure> = Vec::new();
        let mut shards_empty = 0usize;
        for shard_id in 0..num_shards {
            match outcomes.remove(&shard_id) {
                Some(Ok(Some(report))) => shards.push(report),
                Some(Ok(None)) => shards_empty += 1,
                Some(Err(err)) => failures.push(ShardFailure {
                    shard_id,
                    error: err.to_string(),
                }),
                None => failures.push(ShardFailure {
                    shard_id,
                    error: "shard worker panicked before reporting".to_string(),
                }),
            }
        }

        let user_counts: HashMap<ShardId, usize> = shards
            .iter()
            .map(|report| (report.shard_id, report.users))
            .collect();
        let report = RunReport {
            num_shards,
            shards_written: shards.len(),
            shards_empty,
            shards_failed: failures.len(),
            total_users: shards.iter().map(|report| report.users).sum(),
            total_rows: shards.iter().map(|report| report.rows).sum(),
            oov: vocabulary.oov_stats(),
            skew: shard_skew(&user_counts),
            elapsed_secs: started.elapsed().as_secs_f64(),
            shards,
            failures,
        };
        info!(
            shards_written = report.shards_written,
            shards_empty = report.shards_empty,
            shards_failed = report.shards_failed,
            total_users = report.total_users,
            total_rows = report.total_rows,
            "run complete"
        );
        Ok(report)
    }
}

fn build_shard(
    shard_id: ShardId,
    plans: &[DomainPlan],
    partitioner: &ShardPartitioner,
    vocabulary: &VocabularyIndex,
    aggregator: &SequenceAggregator,
    writer: &ShardWriter,
) -> Result<Option<ShardReport>, PipelineError> {
    let mut rows = Vec::new();
    for plan in plans {
        plan.scan_into(partitioner, shard_id, vocabulary, &mut rows)?;
    }
    // `rows` moves into the aggregator and the aggregate drops at the end of
    // this call, before the worker claims its next shard.
    let Some(aggregate) = aggregator.aggregate(rows) else {
        debug!(shard_id, "shard owns no events");
        return Ok(None);
    };

    let path = writer.write(shard_id, &aggregate.sequences)?;
    info!(
        shard_id,
        users = aggregate.sequences.len(),
        rows = aggregate.row_count,
        newest = %format_timestamp(aggregate.max_timestamp),
        "shard published"
    );
    Ok(Some(ShardReport {
        shard_id,
        users: aggregate.sequences.len(),
        rows: aggregate.row_count,
        max_timestamp: aggregate.max_timestamp,
        cutoff: aggregate.cutoff,
        path,
    }))
}
