//! Writes shard artifacts as parquet and reads them back.
//!
//! An artifact is published atomically: rows are written to a dot-prefixed
//! temporary file in the output directory and the file is renamed into place
//! only after the parquet footer is flushed. Readers therefore never observe
//! a partially written `shard_{id}.parquet`, and a re-run replaces the
//! previous artifact in place.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Int64Array, Int64Builder, ListArray, ListBuilder, StringArray, StringBuilder, UInt32Array,
    UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};
use tracing::debug;

use crate::aggregate::UserSequence;
use crate::constants::shards;
use crate::errors::PipelineError;
use crate::types::ShardId;

/// Publishes per-shard sequence tables under one output directory.
#[derive(Clone, Debug)]
pub struct ShardWriter {
    output_dir: PathBuf,
}

impl ShardWriter {
    /// Creates a writer targeting `output_dir`.
    ///
    /// The directory is created on first write, not here, so constructing a
    /// writer for a dry run has no filesystem effect.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The final artifact path for `shard_id`.
    pub fn shard_path(&self, shard_id: ShardId) -> PathBuf {
        self.output_dir.join(shards::file_name(shard_id))
    }

    /// Writes one shard's sequences and atomically publishes the artifact.
    ///
    /// Returns the published path. Passing an empty slice is refused;
    /// shards without users publish nothing at all.
    pub fn write(
        &self,
        shard_id: ShardId,
        sequences: &[UserSequence],
    ) -> Result<PathBuf, PipelineError> {
        let wrap = |reason: String| PipelineError::Shard { shard_id, reason };
        if sequences.is_empty() {
            return Err(wrap("refusing to publish an artifact with no users".to_string()));
        }
        fs::create_dir_all(&self.output_dir).map_err(|err| wrap(err.to_string()))?;

        let batch = encode_batch(sequences).map_err(wrap)?;
        let props = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(Compression::ZSTD(Default::default()))
            .build();

        let tmp = tempfile::Builder::new()
            .prefix(shards::TMP_PREFIX)
            .suffix(".parquet")
            .tempfile_in(&self.output_dir)
            .map_err(|err| wrap(err.to_string()))?;
        let handle = tmp
            .as_file()
            .try_clone()
            .map_err(|err| wrap(err.to_string()))?;
        let mut writer = ArrowWriter::try_new(handle, batch.schema(), Some(props))
            .map_err(|err| wrap(err.to_string()))?;
        writer.write(&batch).map_err(|err| wrap(err.to_string()))?;
        writer.close().map_err(|err| wrap(err.to_string()))?;

        let final_path = self.shard_path(shard_id);
        tmp.persist(&final_path)
            .map_err(|err| wrap(err.to_string()))?;
        debug!(
            shard_id,
            users = sequences.len(),
            path = %final_path.display(),
            "shard artifact published"
        );
        Ok(final_path)
    }
}

/// Reads a published shard artifact back into memory.
///
/// Intended for verification and downstream tooling; the pipeline itself
/// never re-reads what it wrote.
pub fn read_shard(path: &Path) -> Result<Vec<UserSequence>, PipelineError> {
    let wrap = |reason: String| PipelineError::Artifact {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|err| wrap(err.to_string()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|err| wrap(err.to_string()))?
        .build()
        .map_err(|err| wrap(err.to_string()))?;

    let mut sequences = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|err| wrap(err.to_string()))?;
        let schema = batch.schema();
        let user_idx = schema
            .index_of(shards::USER_ID_COLUMN)
            .map_err(|err| wrap(err.to_string()))?;
        let seq_idx = schema
            .index_of(shards::SEQUENCE_COLUMN)
            .map_err(|err| wrap(err.to_string()))?;
        let time_idx = schema
            .index_of(shards::TIMESTAMPS_COLUMN)
            .map_err(|err| wrap(err.to_string()))?;

        let users = batch
            .column(user_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| wrap(format!("'{}' is not utf8", shards::USER_ID_COLUMN)))?;
        let token_lists = batch
            .column(seq_idx)
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| wrap(format!("'{}' is not a list", shards::SEQUENCE_COLUMN)))?;
        let time_lists = batch
            .column(time_idx)
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| wrap(format!("'{}' is not a list", shards::TIMESTAMPS_COLUMN)))?;

        for row in 0..batch.num_rows() {
            let tokens = token_lists.value(row);
            let tokens = tokens
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| wrap("sequence items are not u32".to_string()))?;
            let times = time_lists.value(row);
            let times = times
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| wrap("timestamp items are not i64".to_string()))?;

            sequences.push(UserSequence {
                user_id: users.value(row).to_string(),
                sequence: tokens.values().to_vec(),
                timestamps: times.values().to_vec(),
            });
        }
    }
    Ok(sequences)
}

fn encode_batch(sequences: &[UserSequence]) -> Result<RecordBatch, String> {
    let mut users = StringBuilder::new();
    let mut tokens = ListBuilder::new(UInt32Builder::new());
    let mut times = ListBuilder::new(Int64Builder::new());
    for seq in sequences {
        users.append_value(&seq.user_id);
        tokens.values().append_slice(&seq.sequence);
        tokens.append(true);
        times.values().append_slice(&seq.timestamps);
        times.append(true);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(shards::USER_ID_COLUMN, DataType::Utf8, false),
        Field::new(
            shards::SEQUENCE_COLUMN,
            DataType::List(Arc::new(Field::new("item", DataType::UInt32, true))),
            false,
        ),
        Field::new(
            shards::TIMESTAMPS_COLUMN,
            DataType::List(Arc::new(Field::new("item", DataType::Int64, true))),
            false,
        ),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(users.finish()),
            Arc::new(tokens.finish()),
            Arc::new(times.finish()),
        ],
    )
    .map_err(|err| err.to_string())
}
