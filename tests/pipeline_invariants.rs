use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray, TimestampMillisecondArray, UInt32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use seqshard::{
    PipelineConfig, ShardOrchestrator, ShardPartitioner, UserSequence, VocabularyIndex, read_shard,
};

fn write_parquet(path: &Path, batch: RecordBatch) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn write_event_file(path: &Path, entity_column: &str, rows: &[(&str, i64, &str)]) {
    let users: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|(user, _, _)| *user).collect::<Vec<_>>(),
    ));
    let timestamps: ArrayRef = Arc::new(Int64Array::from(
        rows.iter().map(|(_, ts, _)| *ts).collect::<Vec<_>>(),
    ));
    let entities: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|(_, _, entity)| *entity).collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_from_iter([
        ("user_id", users),
        ("timestamp", timestamps),
        (entity_column, entities),
    ])
    .unwrap();
    write_parquet(path, batch);
}

fn write_vocab_file(path: &Path, pairs: &[(&str, u32)]) {
    let keys: ArrayRef = Arc::new(StringArray::from(
        pairs.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
    ));
    let ids: ArrayRef = Arc::new(UInt32Array::from(
        pairs.iter().map(|(_, id)| *id).collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_from_iter([("token_str", keys), ("token_id", ids)]).unwrap();
    write_parquet(path, batch);
}

fn inline_vocabulary(pairs: &[(&str, u32)], oov_token_id: u32) -> VocabularyIndex {
    VocabularyIndex::build(
        pairs.iter().map(|(key, id)| (key.to_string(), *id)),
        oov_token_id,
    )
    .unwrap()
}

fn sequences_by_user(path: &Path) -> HashMap<String, UserSequence> {
    read_shard(path)
        .unwrap()
        .into_iter()
        .map(|sequence| (sequence.user_id.clone(), sequence))
        .collect()
}

#[test]
fn worked_example_produces_the_documented_shard() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_event_file(
        &raw.path().join("marketplace/events/00000.pq"),
        "item_id",
        &[("u1", 100, "1")],
    );
    write_event_file(
        &raw.path().join("retail/events/00000.pq"),
        "item_id",
        &[("u1", 50, "5")],
    );
    write_event_file(
        &raw.path().join("offers/events/00000.pq"),
        "item_id",
        &[("u1", 75, "9")],
    );
    let vocab_path = raw.path().join("vocab.parquet");
    write_vocab_file(&vocab_path, &[("MP_1", 10), ("RT_5", 20)]);

    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);
    let vocabulary = VocabularyIndex::from_parquet(&vocab_path, config.oov_token_id).unwrap();
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.shards_written, 1);
    assert_eq!(report.shards_empty, 1);
    assert_eq!(report.shards_failed, 0);
    assert_eq!(report.total_users, 1);
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.oov.lookups, 3);
    assert_eq!(report.oov.misses, 1);

    let shard_0 = out.path().join("shard_0.parquet");
    assert!(shard_0.is_file());
    assert!(!out.path().join("shard_1.parquet").exists());

    let sequences = read_shard(&shard_0).unwrap();
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].user_id, "u1");
    assert_eq!(sequences[0].sequence, vec![20, 4, 10]);
    assert_eq!(sequences[0].timestamps, vec![50, 75, 100]);

    assert_eq!(report.shards[0].max_timestamp, 100);
    assert_eq!(report.shards[0].cutoff, 100 - 2 * 86_400_000);
}

#[test]
fn users_are_colocated_and_rows_conserved_across_shards() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_event_file(
        &raw.path().join("marketplace/events/00000.pq"),
        "item_id",
        &[("u1", 10, "1"), ("u2", 20, "1"), ("u3", 30, "2")],
    );
    write_event_file(
        &raw.path().join("marketplace/events/00001.pq"),
        "item_id",
        &[("u4", 40, "2"), ("u5", 50, "1")],
    );
    write_event_file(
        &raw.path().join("retail/events/00000.pq"),
        "item_id",
        &[("u1", 15, "5"), ("u2", 25, "5"), ("u4", 45, "5")],
    );
    // Reviews keep day files at the domain root and reference brands.
    write_event_file(
        &raw.path().join("reviews/00000.pq"),
        "brand_id",
        &[("u3", 35, "77")],
    );
    let vocabulary = inline_vocabulary(
        &[("MP_1", 11), ("MP_2", 12), ("RT_5", 21), ("BR_77", 31)],
        4,
    );

    let config = PipelineConfig::new(raw.path(), out.path())
        .with_num_shards(2)
        .with_worker_threads(2);
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.shards_written, 2);
    assert_eq!(report.shards_failed, 0);
    assert_eq!(report.total_users, 5);
    assert_eq!(report.total_rows, 9);
    assert_eq!(report.oov.misses, 0);

    let partitioner = ShardPartitioner::new(2).unwrap();
    let shard_users = [
        sequences_by_user(&out.path().join("shard_0.parquet")),
        sequences_by_user(&out.path().join("shard_1.parquet")),
    ];
    let expected_rows: HashMap<&str, usize> =
        HashMap::from([("u1", 2), ("u2", 2), ("u3", 2), ("u4", 2), ("u5", 1)]);
    for (user, rows) in &expected_rows {
        let home = partitioner.shard_of(user);
        let away = 1 - home;
        let sequence = shard_users[home]
            .get(*user)
            .unwrap_or_else(|| panic!("{user} missing from its home shard {home}"));
        assert_eq!(sequence.len(), *rows);
        assert!(!shard_users[away].contains_key(*user));
    }
    // u3 reviewed brand 77 after clicking item 2.
    assert_eq!(
        shard_users[partitioner.shard_of("u3")]["u3"].sequence,
        vec![12, 31]
    );

    let skew = report.skew.unwrap();
    assert_eq!(skew.total, 5);
    assert_eq!(skew.shards, 2);
}

#[test]
fn reruns_publish_byte_identical_artifacts() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_event_file(
        &raw.path().join("marketplace/events/00000.pq"),
        "item_id",
        &[("u1", 100, "1"), ("u2", 90, "2"), ("u1", 80, "1")],
    );
    write_event_file(
        &raw.path().join("retail/events/00000.pq"),
        "item_id",
        &[("u2", 100, "5")],
    );
    let vocabulary = inline_vocabulary(&[("MP_1", 11), ("MP_2", 12), ("RT_5", 21)], 4);
    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);

    ShardOrchestrator::new(config.clone())
        .run(&vocabulary)
        .unwrap();
    let first_0 = fs::read(out.path().join("shard_0.parquet")).unwrap();
    let first_1 = fs::read(out.path().join("shard_1.parquet")).unwrap();

    ShardOrchestrator::new(config).run(&vocabulary).unwrap();
    assert_eq!(fs::read(out.path().join("shard_0.parquet")).unwrap(), first_0);
    assert_eq!(fs::read(out.path().join("shard_1.parquet")).unwrap(), first_1);
}

#[test]
fn a_corrupt_domain_file_fails_its_shards_without_stopping_the_run() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let corrupt = raw.path().join("marketplace/events/00000.pq");
    fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    fs::write(&corrupt, b"not parquet at all").unwrap();
    write_event_file(
        &raw.path().join("retail/events/00000.pq"),
        "item_id",
        &[("u1", 50, "5")],
    );
    let vocabulary = inline_vocabulary(&[("RT_5", 21)], 4);

    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.shards_written, 0);
    assert_eq!(report.shards_failed, 2);
    assert!(report.has_failures());
    for failure in &report.failures {
        assert!(
            failure.error.contains("marketplace"),
            "failure should name the bad domain: {}",
            failure.error
        );
    }
    // No artifacts and no stray temp files survive a failed shard.
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn one_failing_shard_leaves_healthy_shards_published() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_event_file(
        &raw.path().join("marketplace/events/00000.pq"),
        "item_id",
        &[("u1", 10, "1"), ("u2", 20, "2")],
    );
    // A directory squatting on shard 1's artifact path makes its atomic
    // rename fail; shard 0 is unaffected.
    fs::create_dir_all(out.path().join("shard_1.parquet")).unwrap();
    let vocabulary = inline_vocabulary(&[("MP_1", 11), ("MP_2", 12)], 4);

    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.shards_written, 1);
    assert_eq!(report.shards_failed, 1);
    assert_eq!(report.failures[0].shard_id, 1);

    let sequences = read_shard(&out.path().join("shard_0.parquet")).unwrap();
    assert_eq!(sequences[0].user_id, "u1");
    assert_eq!(sequences[0].sequence, vec![11]);
}

#[test]
fn integer_user_ids_and_timestamp_columns_are_normalized() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let users: ArrayRef = Arc::new(Int64Array::from(vec![884_213_i64]));
    let timestamps: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![1_200_i64]));
    let items: ArrayRef = Arc::new(Int64Array::from(vec![7_i64]));
    let batch = RecordBatch::try_from_iter([
        ("user_id", users),
        ("timestamp", timestamps),
        ("item_id", items),
    ])
    .unwrap();
    write_parquet(&raw.path().join("marketplace/events/00000.pq"), batch);
    let vocabulary = inline_vocabulary(&[("MP_7", 99)], 4);

    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.total_users, 1);
    let home = ShardPartitioner::new(2).unwrap().shard_of("884213");
    let sequences = read_shard(&out.path().join(format!("shard_{home}.parquet"))).unwrap();
    assert_eq!(sequences[0].user_id, "884213");
    assert_eq!(sequences[0].sequence, vec![99]);
    assert_eq!(sequences[0].timestamps, vec![1_200]);
}

#[test]
fn missing_domain_folders_are_skipped_not_fatal() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_event_file(
        &raw.path().join("retail/events/00000.pq"),
        "item_id",
        &[("u1", 50, "5")],
    );
    let vocabulary = inline_vocabulary(&[("RT_5", 21)], 4);

    let config = PipelineConfig::new(raw.path(), out.path()).with_num_shards(2);
    let report = ShardOrchestrator::new(config).run(&vocabulary).unwrap();

    assert_eq!(report.shards_failed, 0);
    assert_eq!(report.shards_written, 1);
    assert_eq!(report.total_rows, 1);
}
