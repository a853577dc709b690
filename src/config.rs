use std::path::PathBuf;

use indexmap::IndexMap;

use crate::constants::{defaults, domains};
use crate::errors::PipelineError;
use crate::types::{DomainName, DomainPrefix, TokenId};

/// Top-level pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Root directory holding the per-domain raw event folders.
    pub raw_dir: PathBuf,
    /// Directory receiving `shard_{id}.parquet` artifacts.
    pub output_dir: PathBuf,
    /// Number of shards users are hashed into.
    pub num_shards: usize,
    /// Days subtracted from a shard's newest timestamp to derive its cutoff.
    pub cutoff_window_days: i64,
    /// Token id substituted for keys the vocabulary does not know.
    pub oov_token_id: TokenId,
    /// Domain folders to scan, keyed by folder name, valued by token-key
    /// prefix.
    ///
    /// Iteration order is the union order for every shard, which is the
    /// tie-break for events sharing a user and timestamp. Changing the order
    /// changes the artifacts.
    pub domains: IndexMap<DomainName, DomainPrefix>,
    /// Shards processed concurrently.
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new("dataset/full", "dataset/processed/shards")
    }
}

impl PipelineConfig {
    /// Create a config for explicit input and output directories.
    pub fn new(raw_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            output_dir: output_dir.into(),
            num_shards: defaults::NUM_SHARDS,
            cutoff_window_days: defaults::CUTOFF_WINDOW_DAYS,
            oov_token_id: defaults::OOV_TOKEN_ID,
            domains: Self::default_domains(),
            worker_threads: defaults::WORKER_THREADS,
        }
    }

    /// The four sequenced domains in their canonical union order.
    pub fn default_domains() -> IndexMap<DomainName, DomainPrefix> {
        IndexMap::from([
            (
                domains::MARKETPLACE.to_string(),
                domains::PREFIX_MARKETPLACE.to_string(),
            ),
            (
                domains::RETAIL.to_string(),
                domains::PREFIX_RETAIL.to_string(),
            ),
            (
                domains::OFFERS.to_string(),
                domains::PREFIX_OFFERS.to_string(),
            ),
            (
                domains::REVIEWS.to_string(),
                domains::PREFIX_REVIEWS.to_string(),
            ),
        ])
    }

    /// Override the shard count.
    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    /// Override the cutoff window in days.
    pub fn with_cutoff_window_days(mut self, cutoff_window_days: i64) -> Self {
        self.cutoff_window_days = cutoff_window_days;
        self
    }

    /// Override the out-of-vocabulary token id.
    pub fn with_oov_token_id(mut self, oov_token_id: TokenId) -> Self {
        self.oov_token_id = oov_token_id;
        self
    }

    /// Replace the scanned domains and their prefixes.
    pub fn with_domains(mut self, domains: IndexMap<DomainName, DomainPrefix>) -> Self {
        self.domains = domains;
        self
    }

    /// Override the number of concurrent shard workers.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Check the configuration for values no run could make sense of.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.num_shards == 0 {
            return Err(PipelineError::Configuration(
                "num_shards must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(PipelineError::Configuration(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.cutoff_window_days < 0 {
            return Err(PipelineError::Configuration(
                "cutoff_window_days cannot be negative".to_string(),
            ));
        }
        if self.domains.is_empty() {
            return Err(PipelineError::Configuration(
                "at least one domain is required".to_string(),
            ));
        }
        for (domain, prefix) in &self.domains {
            if domain.is_empty() {
                return Err(PipelineError::Configuration(
                    "domain names cannot be empty".to_string(),
                ));
            }
            if prefix.is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "domain '{domain}' has an empty token-key prefix"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_dataset_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.raw_dir, PathBuf::from("dataset/full"));
        assert_eq!(config.num_shards, 50);
        assert_eq!(config.cutoff_window_days, 2);
        assert_eq!(config.oov_token_id, 4);
        assert_eq!(config.worker_threads, 1);

        let order: Vec<(&str, &str)> = config
            .domains
            .iter()
            .map(|(name, prefix)| (name.as_str(), prefix.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("marketplace", "MP_"),
                ("retail", "RT_"),
                ("offers", "OF_"),
                ("reviews", "BR_"),
            ]
        );
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn builders_override_individual_fields() {
        let config = PipelineConfig::new("raw", "out")
            .with_num_shards(8)
            .with_cutoff_window_days(7)
            .with_oov_token_id(0)
            .with_worker_threads(4);
        assert_eq!(config.num_shards, 8);
        assert_eq!(config.cutoff_window_days, 7);
        assert_eq!(config.oov_token_id, 0);
        assert_eq!(config.worker_threads, 4);
        config.validate().expect("overrides are valid");
    }

    #[test]
    fn validation_rejects_unusable_values() {
        assert!(
            PipelineConfig::new("raw", "out")
                .with_num_shards(0)
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::new("raw", "out")
                .with_worker_threads(0)
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::new("raw", "out")
                .with_cutoff_window_days(-1)
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::new("raw", "out")
                .with_domains(IndexMap::new())
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::new("raw", "out")
                .with_domains(IndexMap::from([(
                    "marketplace".to_string(),
                    String::new()
                )]))
                .validate()
                .is_err()
        );
    }
}
