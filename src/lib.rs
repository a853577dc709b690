#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Grouping of event rows into per-user time-ordered sequences.
pub mod aggregate;
/// Pipeline configuration types.
pub mod config;
/// Centralized constants used across partitioning, scanning, and artifacts.
pub mod constants;
/// Per-domain event file discovery and scanning.
pub mod domain;
/// Reusable example runners shared by downstream crates.
pub mod example_apps;
#[cfg(feature = "huggingface")]
/// Dataset mirroring from the Hugging Face Hub.
pub mod fetch;
/// Stable user hashing.
pub mod hash;
/// Aggregate metrics helpers.
pub mod metrics;
/// Shard orchestration and the worker pool.
pub mod orchestrator;
/// User-to-shard assignment.
pub mod partition;
/// Run reports and their JSON serialization.
pub mod report;
/// Shared type aliases.
pub mod types;
/// Vocabulary loading and token lookup.
pub mod vocab;
/// Shard artifact writing and reading.
pub mod writer;

mod columns;
mod errors;

pub use aggregate::{EventRow, SequenceAggregator, ShardAggregate, UserSequence};
pub use config::PipelineConfig;
pub use domain::{DomainPlan, DomainPlanner, DomainScanStats};
pub use errors::PipelineError;
#[cfg(feature = "huggingface")]
pub use fetch::{FetchConfig, FetchReport, Fetcher};
pub use metrics::{ShardShare, ShardSkew};
pub use orchestrator::ShardOrchestrator;
pub use partition::ShardPartitioner;
pub use report::{RunReport, ShardFailure, ShardReport};
pub use types::{DomainName, DomainPrefix, EpochMillis, ShardId, TokenId, TokenKey, UserId};
pub use vocab::{OovStats, VocabularyIndex};
pub use writer::{ShardWriter, read_shard};
