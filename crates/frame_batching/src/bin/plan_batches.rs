//! Batch planning tool.
//!
//! Reads a JSONL item manifest, builds the frame-budgeted batches for one epoch
//! and prints the batches of one shard to stdout, one JSON array of item
//! indices per line. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # All batches of epoch 0, 20k frames per batch
//! plan-batches train.jsonl --max-frames 20000
//!
//! # Rank 1 of 4, epoch 3, batches kept within one language
//! plan-batches train.jsonl --max-frames 20000 --partitioned \
//!     --num-shards 4 --rank 1 --epoch 3
//!
//! # Settings from a config file (WORLD_SIZE / RANK are read from the environment)
//! plan-batches train.jsonl --config batching.json
//! ```

use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frame_batching::{
    Batch, BatchingConfig, EpochSampler, FrameBudgetSampler, ManifestSource,
    PartitionedFrameBudgetSampler, ShardConfig, ShardedSampler,
};

/// Frame-budgeted batch planner
#[derive(Parser, Debug)]
#[command(name = "plan-batches")]
#[command(about = "Print the frame-budgeted batches of one shard and epoch")]
struct Args {
    /// JSONL manifest with one `{"cost": .., "category": ..}` entry per line
    manifest: String,

    /// JSON batching config; command-line flags take precedence
    #[arg(short, long)]
    config: Option<String>,

    /// Frame budget per batch
    #[arg(long)]
    max_frames: Option<u64>,

    /// Epoch to plan
    #[arg(long, default_value = "0")]
    epoch: usize,

    /// Number of shards (defaults to WORLD_SIZE, or 1)
    #[arg(long)]
    num_shards: Option<usize>,

    /// Shard to print (defaults to RANK, or 0)
    #[arg(long)]
    rank: Option<usize>,

    /// Keep every batch within a single category
    #[arg(long)]
    partitioned: bool,

    /// Disable shuffling of equal-cost items and of shard positions
    #[arg(long)]
    no_shuffle: bool,

    /// Truncate instead of pad when batches don't divide across shards
    #[arg(long)]
    drop_last: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let batching = batching_config(&args)?;
    let sharding = shard_config(&args, &batching)?;
    let items = Arc::new(ManifestSource::new(&args.manifest).load_items()?);

    tracing::info!("Planning epoch {}", args.epoch);
    tracing::info!("  Max frames per batch: {}", batching.max_frames_per_batch);
    tracing::info!("  Shard: {} of {}", sharding.rank, sharding.num_shards);

    if args.partitioned {
        let sampler = PartitionedFrameBudgetSampler::from_config(items, &batching)?;
        plan(sampler, &sharding, args.epoch)
    } else {
        let sampler = FrameBudgetSampler::from_config(items, &batching)?;
        plan(sampler, &sharding, args.epoch)
    }
}

fn batching_config(args: &Args) -> Result<BatchingConfig> {
    let mut config = match &args.config {
        Some(path) => BatchingConfig::from_json_file(path)?,
        None => BatchingConfig::default(),
    };
    if let Some(max_frames) = args.max_frames {
        config.max_frames_per_batch = max_frames;
    }
    if args.no_shuffle {
        config.shuffle = false;
    }
    config
        .validate()
        .context("A positive frame budget is required (--max-frames or config)")?;
    Ok(config)
}

fn shard_config(args: &Args, batching: &BatchingConfig) -> Result<ShardConfig> {
    let mut config = ShardConfig::builder()
        .shuffle(batching.shuffle)
        .drop_last(args.drop_last)
        .seed(batching.seed)
        .build()
        .with_env_overrides()?;
    if let Some(num_shards) = args.num_shards {
        config.num_shards = num_shards;
    }
    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    config.validate()?;
    Ok(config)
}

fn plan<S>(mut sampler: S, sharding: &ShardConfig, epoch: usize) -> Result<()>
where
    S: EpochSampler<Item = Batch>,
{
    if sharding.num_shards == 1 {
        sampler.set_epoch(epoch);
        return emit(sampler.iter_current());
    }

    let mut sharded = ShardedSampler::from_config(sampler, sharding)?;
    sharded.set_epoch(epoch);
    tracing::info!(
        "Shard holds {} of {} batch slots",
        sharded.num_samples(),
        sharded.total_size()
    );
    let batches = sharded.iter()?;
    emit(batches)
}

fn emit(batches: impl Iterator<Item = Batch>) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0usize;
    for batch in batches {
        serde_json::to_writer(&mut out, &batch)?;
        writeln!(out)?;
        count += 1;
    }
    out.flush()?;
    tracing::info!("Wrote {} batches", count);
    Ok(())
}
