#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, info_span};

use vidq_dataset::config::DatasetConfig;
use vidq_dataset::dataset::PairedClipDataset;
use vidq_dataset::prefetch::{ClipPrefetcher, PrefetchConfig};

#[derive(Debug, Parser)]
#[command(name = "vidq-probe")]
#[command(about = "Load a few paired LQ/GT samples through the prefetch queue and report them")]
struct Args {
    /// Dataset options JSON (dataroot_gt, dataroot_lq, dataroot_meta, num_frame, ...).
    #[arg(long, env = "VIDQ_DATASET_CONFIG")]
    config: PathBuf,

    /// Number of samples to pull before shutting the prefetcher down.
    #[arg(long, env = "VIDQ_PROBE_SAMPLES", default_value_t = 8)]
    samples: usize,

    /// Samples buffered ahead of the consumer.
    #[arg(long, env = "VIDQ_QUEUE_CAPACITY", default_value_t = 4)]
    queue_capacity: usize,

    /// Visit clips in random order.
    #[arg(long, default_value_t = false)]
    shuffle: bool,
}

fn main() -> Result<()> {
    vidq_observe::logging::init_tracing();

    let args = Args::parse();
    let span = info_span!("vidq-probe", config = %args.config.display());
    let _enter = span.enter();

    let cfg = DatasetConfig::from_json_file(&args.config)
        .with_context(|| format!("loading dataset config {}", args.config.display()))?;
    let seed = cfg.seed;
    let dataset = Arc::new(PairedClipDataset::open_default(cfg)?);
    if dataset.is_empty() {
        info!("dataset has no clips; nothing to probe");
        return Ok(());
    }

    let mut prefetcher = ClipPrefetcher::spawn(
        dataset.clone(),
        PrefetchConfig {
            capacity: args.queue_capacity,
            shuffle: args.shuffle,
            seed,
            name: "probe".to_string(),
        },
    )?;

    let mut pulled = 0usize;
    for sample in prefetcher.by_ref().take(args.samples) {
        let sample = sample?;
        pulled += 1;
        info!(
            key = %sample.key,
            lq_shape = ?sample.lq.shape,
            gt_shape = ?sample.gt.shape,
            "sample"
        );
    }
    let report = prefetcher.shutdown()?;

    let read = dataset.metrics().read_time.snapshot();
    info!(
        pulled = pulled as u64,
        discarded = report.discarded,
        sample_errors = dataset.metrics().sample_errors_total.get(),
        read_avg_ms = read.avg_ns() / 1_000_000,
        read_max_ms = read.max_ns / 1_000_000,
        "probe finished"
    );
    Ok(())
}
