//! Bulk download of the raw dataset from the Hugging Face Hub.
//!
//! The fetcher mirrors the repository's `dataset/full` tree into a local
//! directory, file by file, so the sharding pipeline can run against the same
//! relative layout it would see on the Hub. Files already present locally are
//! skipped, so an interrupted session resumes by running it again.
//! Individual download failures are collected into the session report
//! rather than aborting the remaining files.
//!
//! The payments domain is fetched like any other, including its extra
//! receipts stream, even though sequence building does not consume it; a
//! complete local mirror keeps later pipeline changes from needing another
//! multi-day download.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::constants::{domains, fetch};
use crate::errors::PipelineError;

/// Configuration for one download session.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Hugging Face dataset repository id.
    pub repo_id: String,
    /// Path prefix inside the repository to mirror.
    pub dataset_path: String,
    /// Local directory receiving the mirrored tree.
    pub local_dir: PathBuf,
    /// Domains to fetch day files for.
    pub domains: Vec<String>,
    /// First day index to fetch, inclusive.
    pub day_begin: u32,
    /// Last day index to fetch, inclusive.
    pub day_end: u32,
    /// Parallel download workers.
    pub max_workers: usize,
    /// Access token for gated repositories; anonymous when `None`.
    pub token: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(fetch::LOCAL_DIR)
    }
}

impl FetchConfig {
    /// Create a config mirroring the full dataset into `local_dir`.
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_id: fetch::DATASET_REPO.to_string(),
            dataset_path: fetch::DATASET_PATH.to_string(),
            local_dir: local_dir.into(),
            domains: fetch::ALL_DOMAINS.iter().map(|name| name.to_string()).collect(),
            day_begin: 0,
            day_end: fetch::LAST_DAY,
            max_workers: fetch::MAX_WORKERS,
            token: None,
        }
    }

    /// Restrict the session to specific domains.
    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Restrict the session to an inclusive day range.
    pub fn with_day_range(mut self, day_begin: u32, day_end: u32) -> Self {
        self.day_begin = day_begin;
        self.day_end = day_end;
        self
    }

    /// Override the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Attach an access token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Check the configuration for values no session could make sense of.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_workers == 0 {
            return Err(PipelineError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.day_begin > self.day_end {
            return Err(PipelineError::Configuration(format!(
                "day range is inverted: {} > {}",
                self.day_begin, self.day_end
            )));
        }
        Ok(())
    }
}

/// Repo-relative file patterns for one session, in deterministic order.
///
/// Static catalog files come first, then per-domain item catalogs, then day
/// files domain by domain. Reviews day files sit at the domain root, the
/// payments domain carries a second receipts stream, and every other domain
/// keeps its day files under `events/`.
pub fn file_patterns(config: &FetchConfig) -> Vec<String> {
    let prefix = &config.dataset_path;
    let mut patterns = Vec::new();
    for name in fetch::STATIC_FILES {
        patterns.push(format!("{prefix}/{name}"));
    }
    for domain in &config.domains {
        if fetch::ITEM_DOMAINS.contains(&domain.as_str()) {
            patterns.push(format!("{prefix}/{domain}/{}", fetch::ITEMS_FILE));
        }
    }
    for domain in &config.domains {
        for day in config.day_begin..=config.day_end {
            let day_file = day_file_name(day);
            if domain == domains::REVIEWS {
                patterns.push(format!("{prefix}/{domain}/{day_file}"));
            } else {
                patterns.push(format!(
                    "{prefix}/{domain}/{}/{day_file}",
                    domains::EVENTS_SUBDIR
                ));
                if domain == fetch::PAYMENTS_DOMAIN {
                    patterns.push(format!(
                        "{prefix}/{domain}/{}/{day_file}",
                        fetch::RECEIPTS_SUBDIR
                    ));
                }
            }
        }
    }
    patterns
}

fn day_file_name(day: u32) -> String {
    let width = fetch::DAY_PAD_WIDTH;
    format!("{day:0width$}.pq")
}

/// One pattern that could not be fetched.
#[derive(Clone, Debug, Serialize)]
pub struct FailedFetch {
    /// Repo-relative pattern.
    pub pattern: String,
    /// Rendered error message.
    pub reason: String,
}

/// Results of one download session.
#[derive(Clone, Debug, Serialize)]
pub struct FetchReport {
    /// Patterns the session planned.
    pub requested: usize,
    /// Files downloaded this session.
    pub fetched: Vec<String>,
    /// Files already materialized and left untouched.
    pub skipped: Vec<String>,
    /// Patterns that failed.
    pub failed: Vec<FailedFetch>,
}

impl FetchReport {
    /// True when at least one file failed to fetch.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

enum FetchOutcome {
    Fetched,
    Skipped,
    Failed(String),
}

/// Downloads the planned dataset tree with a bounded worker pool.
pub struct Fetcher {
    config: FetchConfig,
}

impl Fetcher {
    /// Creates a fetcher after validating the configuration.
    pub fn new(config: FetchConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this fetcher runs with.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches every planned file, skipping ones already materialized.
    pub fn fetch(&self) -> Result<FetchReport, PipelineError> {
        let patterns = file_patterns(&self.config);
        fs::create_dir_all(&self.config.local_dir)?;
        eprintln!(
            "[seqshard:fetch] mirroring {} file(s) from {} into {}",
            patterns.len(),
            self.config.repo_id,
            self.config.local_dir.display()
        );
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|err| PipelineError::Fetch {
                pattern: "<worker pool>".to_string(),
                reason: err.to_string(),
            })?;
        let outcomes: Vec<(String, FetchOutcome)> = pool.install(|| {
            patterns
                .par_iter()
                .map(|pattern| (pattern.clone(), self.fetch_one(pattern)))
                .collect()
        });

        let mut report = FetchReport {
            requested: outcomes.len(),
            fetched: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };
        for (pattern, outcome) in outcomes {
            match outcome {
                FetchOutcome::Fetched => report.fetched.push(pattern),
                FetchOutcome::Skipped => report.skipped.push(pattern),
                FetchOutcome::Failed(reason) => {
                    eprintln!("[seqshard:fetch] failed {pattern}: {reason}");
                    report.failed.push(FailedFetch { pattern, reason });
                }
            }
        }
        eprintln!(
            "[seqshard:fetch] session done in {:.2}s (fetched={}, skipped={}, failed={})",
            started.elapsed().as_secs_f64(),
            report.fetched.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn fetch_one(&self, pattern: &str) -> FetchOutcome {
        let target = self.config.local_dir.join(pattern);
        if target.exists() {
            debug!(pattern, "already materialized, skipped");
            return FetchOutcome::Skipped;
        }
        match self.download_and_materialize(pattern, &target) {
            Ok(()) => FetchOutcome::Fetched,
            Err(err) => FetchOutcome::Failed(err.to_string()),
        }
    }

    fn download_and_materialize(&self, pattern: &str, target: &Path) -> Result<(), PipelineError> {
        let wrap = |reason: String| PipelineError::Fetch {
            pattern: pattern.to_string(),
            reason,
        };

        let api = ApiBuilder::new()
            .with_progress(true)
            .with_retries(5)
            .with_token(self.config.token.clone())
            .build()
            .map_err(|err| wrap(format!("failed building hub client: {err}")))?;
        let repo_api = api.repo(Repo::new(self.config.repo_id.clone(), RepoType::Dataset));

        let mut cached = repo_api
            .get(pattern)
            .map_err(|err| wrap(format!("download failed: {err}")))?;
        if !cached.exists() {
            for _ in 0..5 {
                cached = repo_api
                    .download(pattern)
                    .map_err(|err| wrap(format!("forced download failed: {err}")))?;
                if cached.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(400));
            }
        }
        if !cached.exists() {
            return Err(wrap(format!(
                "hub returned a missing cache file at {}",
                cached.display()
            )));
        }

        materialize(&cached, target).map_err(wrap)
    }
}

fn materialize(cached: &Path, target: &Path) -> Result<(), String> {
    let resolved = fs::canonicalize(cached).unwrap_or_else(|_| cached.to_path_buf());
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }
    if target.exists() {
        let src_len = fs::metadata(&resolved)
            .map_err(|err| format!("failed reading {}: {err}", resolved.display()))?
            .len();
        let dst_len = fs::metadata(target)
            .map_err(|err| format!("failed reading {}: {err}", target.display()))?
            .len();
        if src_len == dst_len {
            return Ok(());
        }
        fs::remove_file(target)
            .map_err(|err| format!("failed replacing {}: {err}", target.display()))?;
    }
    fs::copy(&resolved, target).map_err(|err| {
        format!(
            "failed copying {} -> {}: {err}",
            resolved.display(),
            target.display()
        )
    })?;
    Ok(())
}
