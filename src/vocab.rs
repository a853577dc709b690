//! Token vocabulary loaded once per run and shared read-only across workers.
//!
//! The vocabulary maps a token key (domain prefix plus entity id, e.g.
//! `MP_12345`) to the integer token id a downstream model consumes. Keys that
//! are absent resolve to the configured out-of-vocabulary id, and the index
//! counts how often that happens so a run can report its OOV rate. Lookups
//! take `&self` and the counters are atomics, so one index wrapped in an
//! [`Arc`](std::sync::Arc) serves every shard worker concurrently.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use tracing::debug;

use crate::columns;
use crate::constants::vocab;
use crate::errors::PipelineError;
use crate::types::{TokenId, TokenKey};

/// Lookup-counter snapshot for one run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OovStats {
    /// Total lookups served.
    pub lookups: u64,
    /// Lookups that fell back to the out-of-vocabulary id.
    pub misses: u64,
    /// `misses / lookups`, or `0.0` before the first lookup.
    pub rate: f64,
}

/// Immutable token-key to token-id mapping with an out-of-vocabulary default.
#[derive(Debug)]
pub struct VocabularyIndex {
    tokens: HashMap<TokenKey, TokenId>,
    oov_token_id: TokenId,
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl VocabularyIndex {
    /// Builds an index from `(token_key, token_id)` pairs.
    ///
    /// Repeating a pair with the same id is tolerated; the same key mapping to
    /// two different ids is a conflict and fails the whole load, since a
    /// vocabulary that disagrees with itself would silently corrupt every
    /// sequence that touches the key.
    pub fn build(
        pairs: impl IntoIterator<Item = (TokenKey, TokenId)>,
        oov_token_id: TokenId,
    ) -> Result<Self, PipelineError> {
        let mut tokens = HashMap::new();
        insert_pairs(&mut tokens, pairs).map_err(|reason| PipelineError::Vocabulary {
            source_path: "<inline pairs>".to_string(),
            reason,
        })?;
        Ok(Self::from_tokens(tokens, oov_token_id))
    }

    /// Loads the index from a parquet file with `token_str` and `token_id`
    /// columns.
    ///
    /// A missing or unreadable file is fatal: without the vocabulary every
    /// lookup would degrade to the OOV id and the output would be garbage.
    pub fn from_parquet(
        path: impl AsRef<Path>,
        oov_token_id: TokenId,
    ) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let wrap = |reason: String| PipelineError::Vocabulary {
            source_path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|err| wrap(err.to_string()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|err| wrap(err.to_string()))?
            .build()
            .map_err(|err| wrap(err.to_string()))?;

        let mut tokens = HashMap::new();
        for batch in reader {
            let batch = batch.map_err(|err| wrap(err.to_string()))?;
            let schema = batch.schema();
            let key_idx = schema
                .index_of(vocab::TOKEN_STR_COLUMN)
                .map_err(|err| wrap(err.to_string()))?;
            let id_idx = schema
                .index_of(vocab::TOKEN_ID_COLUMN)
                .map_err(|err| wrap(err.to_string()))?;
            let keys = batch.column(key_idx);
            let ids = batch.column(id_idx);

            let mut rows = Vec::with_capacity(batch.num_rows());
            for row in 0..batch.num_rows() {
                let key = columns::string_at(keys.as_ref(), row).ok_or_else(|| {
                    wrap(format!("row {row}: '{}' is null or not text", vocab::TOKEN_STR_COLUMN))
                })?;
                let id = columns::u32_at(ids.as_ref(), row).ok_or_else(|| {
                    wrap(format!(
                        "row {row}: '{}' is null or not an unsigned 32-bit integer",
                        vocab::TOKEN_ID_COLUMN
                    ))
                })?;
                rows.push((key, id));
            }
            insert_pairs(&mut tokens, rows).map_err(wrap)?;
        }

        debug!(
            source_path = %path.display(),
            entries = tokens.len(),
            oov_token_id,
            "vocabulary loaded"
        );
        Ok(Self::from_tokens(tokens, oov_token_id))
    }

    fn from_tokens(tokens: HashMap<TokenKey, TokenId>, oov_token_id: TokenId) -> Self {
        Self {
            tokens,
            oov_token_id,
            lookups: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolves a token key, falling back to the OOV id for unknown keys.
    pub fn lookup(&self, token_key: &str) -> TokenId {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        match self.tokens.get(token_key) {
            Some(id) => *id,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.oov_token_id
            }
        }
    }

    /// The id returned for unknown keys.
    pub fn oov_token_id(&self) -> TokenId {
        self.oov_token_id
    }

    /// Number of known token keys.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when the index holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Snapshot of the lookup counters.
    pub fn oov_stats(&self) -> OovStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let rate = if lookups == 0 {
            0.0
        } else {
            misses as f64 / lookups as f64
        };
        OovStats {
            lookups,
            misses,
            rate,
        }
    }
}

fn insert_pairs(
    tokens: &mut HashMap<TokenKey, TokenId>,
    pairs: impl IntoIterator<Item = (TokenKey, TokenId)>,
) -> Result<(), String> {
    for (key, id) in pairs {
        match tokens.entry(key) {
            Entry::Occupied(existing) => {
                if *existing.get() != id {
                    return Err(format!(
                        "token key '{}' maps to both {} and {}",
                        existing.key(),
                        existing.get(),
                        id
                    ));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
    }
    Ok(())
}
