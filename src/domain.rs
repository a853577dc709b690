//! Per-domain discovery and scanning of raw event files.
//!
//! A plan is cheap to build: it only lists the day files a domain contributes
//! and records which columns matter. No event data is read until a shard asks
//! for its slice, and even then only three columns are decoded per file: the
//! user id, the timestamp, and the domain's entity id. Rows owned by other
//! shards are dropped before any token resolution happens.

use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::aggregate::EventRow;
use crate::columns;
use crate::constants::{domains, events};
use crate::errors::PipelineError;
use crate::partition::ShardPartitioner;
use crate::types::{DomainName, DomainPrefix, ShardId};
use crate::vocab::VocabularyIndex;

/// Builds scan plans for the domains under one raw-data root.
#[derive(Clone, Debug)]
pub struct DomainPlanner {
    raw_dir: PathBuf,
}

impl DomainPlanner {
    /// Creates a planner rooted at the raw dataset directory.
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    /// Plans one domain, returning `None` when it has nothing to scan.
    ///
    /// Day files live under `{raw_dir}/{domain}/events/`, except for the
    /// reviews domain whose day files sit directly under
    /// `{raw_dir}/reviews/`. Reviews events identify a brand rather than an
    /// item, so the plan reads `brand_id` there and `item_id` everywhere
    /// else. A missing directory or an empty one is a normal state for a
    /// partially downloaded dataset, not an error.
    pub fn plan(
        &self,
        domain: &str,
        prefix: &str,
    ) -> Result<Option<DomainPlan>, PipelineError> {
        let events_dir = if domain == domains::REVIEWS {
            self.raw_dir.join(domain)
        } else {
            self.raw_dir.join(domain).join(domains::EVENTS_SUBDIR)
        };
        if !events_dir.is_dir() {
            debug!(domain, dir = %events_dir.display(), "no event directory, domain skipped");
            return Ok(None);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&events_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| PipelineError::Domain {
                domain: domain.to_string(),
                reason: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if has_event_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            debug!(domain, dir = %events_dir.display(), "no event files, domain skipped");
            return Ok(None);
        }
        files.sort();

        Ok(Some(DomainPlan {
            domain: domain.to_string(),
            prefix: prefix.to_string(),
            entity_column: entity_column_for(domain),
            files,
        }))
    }
}

/// A planned scan over one domain's day files.
#[derive(Clone, Debug)]
pub struct DomainPlan {
    domain: DomainName,
    prefix: DomainPrefix,
    entity_column: &'static str,
    files: Vec<PathBuf>,
}

/// Row counters for one `scan_into` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomainScanStats {
    /// Rows inspected across every file in the plan.
    pub rows_scanned: usize,
    /// Rows owned by the requested shard and appended to the sink.
    pub rows_kept: usize,
    /// Rows dropped because a required cell was null or untypable.
    pub rows_skipped: usize,
}

impl DomainPlan {
    /// The domain folder name this plan scans.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The column holding the entity id, `brand_id` or `item_id`.
    pub fn entity_column(&self) -> &str {
        self.entity_column
    }

    /// The day files the plan will read, in sorted path order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of day files in the plan.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Appends the requested shard's tokenized rows to `sink`.
    ///
    /// Token keys are the domain prefix concatenated with the entity id;
    /// unknown keys resolve through the vocabulary's OOV fallback. The sink
    /// receives rows in file order, which the aggregator's stable sort later
    /// relies on for tie-breaking.
    pub fn scan_into(
        &self,
        partitioner: &ShardPartitioner,
        shard_id: ShardId,
        vocabulary: &VocabularyIndex,
        sink: &mut Vec<EventRow>,
    ) -> Result<DomainScanStats, PipelineError> {
        let mut stats = DomainScanStats::default();
        for path in &self.files {
            self.scan_file(path, partitioner, shard_id, vocabulary, sink, &mut stats)?;
        }
        debug!(
            domain = %self.domain,
            shard_id,
            rows_scanned = stats.rows_scanned,
            rows_kept = stats.rows_kept,
            rows_skipped = stats.rows_skipped,
            "domain scan complete"
        );
        Ok(stats)
    }

    fn scan_file(
        &self,
        path: &Path,
        partitioner: &ShardPartitioner,
        shard_id: ShardId,
        vocabulary: &VocabularyIndex,
        sink: &mut Vec<EventRow>,
        stats: &mut DomainScanStats,
    ) -> Result<(), PipelineError> {
        let wrap = |reason: String| PipelineError::Domain {
            domain: self.domain.clone(),
            reason: format!("{}: {reason}", path.display()),
        };

        let file = File::open(path).map_err(|err| wrap(err.to_string()))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|err| wrap(err.to_string()))?;
        let projection = ProjectionMask::columns(
            builder.parquet_schema(),
            [
                events::USER_ID_COLUMN,
                events::TIMESTAMP_COLUMN,
                self.entity_column,
            ],
        );
        let reader = builder
            .with_projection(projection)
            .build()
            .map_err(|err| wrap(err.to_string()))?;

        for batch in reader {
            let batch = batch.map_err(|err| wrap(err.to_string()))?;
            let schema = batch.schema();
            let user_idx = schema
                .index_of(events::USER_ID_COLUMN)
                .map_err(|err| wrap(err.to_string()))?;
            let time_idx = schema
                .index_of(events::TIMESTAMP_COLUMN)
                .map_err(|err| wrap(err.to_string()))?;
            let entity_idx = schema
                .index_of(self.entity_column)
                .map_err(|err| wrap(err.to_string()))?;
            let users = batch.column(user_idx);
            let times = batch.column(time_idx);
            let entities = batch.column(entity_idx);

            for row in 0..batch.num_rows() {
                stats.rows_scanned += 1;
                let Some(user_id) = columns::string_at(users.as_ref(), row) else {
                    stats.rows_skipped += 1;
                    continue;
                };
                if !partitioner.owns(shard_id, &user_id) {
                    continue;
                }
                let Some(timestamp) = columns::millis_at(times.as_ref(), row) else {
                    stats.rows_skipped += 1;
                    continue;
                };
                let Some(entity_id) = columns::string_at(entities.as_ref(), row) else {
                    stats.rows_skipped += 1;
                    continue;
                };

                let mut token_key =
                    String::with_capacity(self.prefix.len() + entity_id.len());
                token_key.push_str(&self.prefix);
                token_key.push_str(&entity_id);

                sink.push(EventRow {
                    user_id,
                    timestamp,
                    token_id: vocabulary.lookup(&token_key),
                });
                stats.rows_kept += 1;
            }
        }
        Ok(())
    }
}

fn entity_column_for(domain: &str) -> &'static str {
    if domain == domains::REVIEWS {
        domains::BRAND_COLUMN
    } else {
        domains::ITEM_COLUMN
    }
}

fn has_event_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| domains::EVENT_EXTENSIONS.contains(&ext))
}
