use std::io;

use thiserror::Error;

use crate::types::{DomainName, ShardId};

/// Failure taxonomy for the sharding pipeline.
///
/// Vocabulary and configuration problems are fatal to a run; domain and shard
/// problems are scoped to the shard being processed and are collected into the
/// run report instead of aborting the fan-out.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The vocabulary source could not be loaded or is internally inconsistent.
    #[error("vocabulary source '{source_path}' is unusable: {reason}")]
    Vocabulary {
        /// Path or label of the vocabulary source.
        source_path: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A domain's event files could not be planned or scanned.
    #[error("domain '{domain}' failed: {reason}")]
    Domain {
        /// Domain folder name.
        domain: DomainName,
        /// Human-readable cause.
        reason: String,
    },

    /// Building or publishing one shard failed.
    #[error("shard {shard_id} failed: {reason}")]
    Shard {
        /// The shard being processed.
        shard_id: ShardId,
        /// Human-readable cause.
        reason: String,
    },

    /// A materialized artifact could not be read or written.
    #[error("artifact '{path}' is unusable: {reason}")]
    Artifact {
        /// Filesystem path of the artifact.
        path: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A remote dataset file could not be fetched.
    #[cfg(feature = "huggingface")]
    #[error("fetch of '{pattern}' failed: {reason}")]
    Fetch {
        /// Repo-relative file pattern.
        pattern: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Filesystem access failed outside any narrower category.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The run was configured with unusable parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
