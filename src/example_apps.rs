use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::config::PipelineConfig;
use crate::constants::defaults;
#[cfg(feature = "huggingface")]
use crate::fetch::{FetchConfig, FetchReport, Fetcher};
use crate::orchestrator::ShardOrchestrator;
use crate::report::{RunReport, format_timestamp};
use crate::vocab::VocabularyIndex;

#[derive(Debug, Parser)]
#[command(
    name = "build_shards",
    disable_help_subcommand = true,
    about = "Build per-user token sequence shards from raw event logs",
    long_about = "Scan per-domain event files, resolve entities to token ids through a vocabulary parquet, group events into per-user time-ordered sequences, and publish one parquet artifact per shard."
)]
struct BuildShardsCli {
    #[arg(
        long = "raw-dir",
        value_name = "DIR",
        default_value = "dataset/full",
        help = "Root directory holding the per-domain raw event folders"
    )]
    raw_dir: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = "dataset/processed/shards",
        help = "Directory receiving shard_{id}.parquet artifacts"
    )]
    output_dir: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        default_value = "dataset/processed/vocab.parquet",
        help = "Vocabulary parquet with token_str and token_id columns"
    )]
    vocab: PathBuf,
    #[arg(
        long = "num-shards",
        default_value_t = defaults::NUM_SHARDS,
        value_parser = parse_positive_usize,
        help = "Number of shards users are hashed into"
    )]
    num_shards: usize,
    #[arg(
        long = "workers",
        default_value_t = defaults::WORKER_THREADS,
        value_parser = parse_positive_usize,
        help = "Shards processed concurrently"
    )]
    workers: usize,
    #[arg(
        long,
        default_value_t = defaults::CUTOFF_WINDOW_DAYS,
        help = "Days subtracted from each shard's newest timestamp for its cutoff"
    )]
    cutoff_window_days: i64,
    #[arg(
        long,
        default_value_t = defaults::OOV_TOKEN_ID,
        help = "Token id substituted for keys missing from the vocabulary"
    )]
    oov_token_id: u32,
    #[arg(
        long = "report-json",
        value_name = "FILE",
        help = "Optional path for a JSON run report"
    )]
    report_json: Option<PathBuf>,
}

/// Runs the shard-building pipeline with CLI arguments.
///
/// `args_iter` carries the arguments after the binary name, as produced by
/// `std::env::args().skip(1)`.
pub fn run_build_shards<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<BuildShardsCli, _>(
        std::iter::once("build_shards".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = PipelineConfig::new(cli.raw_dir, cli.output_dir)
        .with_num_shards(cli.num_shards)
        .with_worker_threads(cli.workers)
        .with_cutoff_window_days(cli.cutoff_window_days)
        .with_oov_token_id(cli.oov_token_id);

    let vocabulary = VocabularyIndex::from_parquet(&cli.vocab, config.oov_token_id)?;
    println!(
        "Loaded vocabulary with {} token keys from {}",
        vocabulary.len(),
        cli.vocab.display()
    );

    let report = ShardOrchestrator::new(config).run(&vocabulary)?;
    print_run_report(&report);

    if let Some(path) = cli.report_json {
        report.write_json(&path)?;
        println!("Run report written to {}", path.display());
    }

    if report.has_failures() {
        return Err(format!("{} shard(s) failed", report.shards_failed).into());
    }
    Ok(())
}

#[cfg(feature = "huggingface")]
#[derive(Debug, Parser)]
#[command(
    name = "fetch_dataset",
    disable_help_subcommand = true,
    about = "Mirror the raw dataset from the Hugging Face Hub",
    long_about = "Download the dataset tree (static catalogs plus per-domain day files) into a local directory, skipping files already present so an interrupted session can resume."
)]
struct FetchDatasetCli {
    #[arg(
        long = "local-dir",
        value_name = "DIR",
        default_value = "t_ecd_full",
        help = "Local directory receiving the mirrored tree"
    )]
    local_dir: PathBuf,
    #[arg(
        long,
        value_name = "DOMAIN",
        num_args = 1..,
        help = "Domains to fetch; omit for all five"
    )]
    domains: Vec<String>,
    #[arg(
        long = "day-begin",
        default_value_t = 0,
        help = "First day index, inclusive"
    )]
    day_begin: u32,
    #[arg(
        long = "day-end",
        default_value_t = crate::constants::fetch::LAST_DAY,
        help = "Last day index, inclusive"
    )]
    day_end: u32,
    #[arg(
        long,
        default_value_t = crate::constants::fetch::MAX_WORKERS,
        value_parser = parse_positive_usize,
        help = "Parallel download workers"
    )]
    max_workers: usize,
    #[arg(long, value_name = "TOKEN", help = "Access token for gated repositories")]
    token: Option<String>,
}

/// Runs a dataset download session with CLI arguments.
#[cfg(feature = "huggingface")]
pub fn run_fetch_dataset<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<FetchDatasetCli, _>(
        std::iter::once("fetch_dataset".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let mut config = FetchConfig::new(cli.local_dir)
        .with_day_range(cli.day_begin, cli.day_end)
        .with_max_workers(cli.max_workers)
        .with_token(cli.token);
    if !cli.domains.is_empty() {
        config = config.with_domains(cli.domains);
    }

    let report = Fetcher::new(config)?.fetch()?;
    print_fetch_report(&report);

    if report.has_failures() {
        return Err(format!("{} file(s) failed to fetch", report.failed.len()).into());
    }
    Ok(())
}

fn print_run_report(report: &RunReport) {
    println!("=== shard run ===");
    println!("shards       : {}", report.num_shards);
    println!("written      : {}", report.shards_written);
    println!("empty        : {}", report.shards_empty);
    println!("failed       : {}", report.shards_failed);
    println!("users        : {}", report.total_users);
    println!("rows         : {}", report.total_rows);
    println!(
        "oov          : {}/{} lookups ({:.2}%)",
        report.oov.misses,
        report.oov.lookups,
        report.oov.rate * 100.0
    );
    println!("elapsed      : {:.2}s", report.elapsed_secs);
    for shard in &report.shards {
        println!(
            "shard {:>4}: users={} rows={} newest={} -> {}",
            shard.shard_id,
            shard.users,
            shard.rows,
            format_timestamp(shard.max_timestamp),
            shard.path.display()
        );
    }
    if let Some(skew) = &report.skew {
        println!(
            "skew: shards={} total={} min={} max={} mean={:.2} ratio={:.2}",
            skew.shards, skew.total, skew.min, skew.max, skew.mean, skew.ratio
        );
    }
    for failure in &report.failures {
        eprintln!("shard {} FAILED: {}", failure.shard_id, failure.error);
    }
}

#[cfg(feature = "huggingface")]
fn print_fetch_report(report: &FetchReport) {
    println!("=== fetch session ===");
    println!("requested    : {}", report.requested);
    println!("fetched      : {}", report.fetched.len());
    println!("skipped      : {}", report.skipped.len());
    println!("failed       : {}", report.failed.len());
    for failure in &report.failed {
        eprintln!("failed {}: {}", failure.pattern, failure.reason);
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
