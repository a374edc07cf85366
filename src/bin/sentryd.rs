//! sentryd - motion sentry daemon
//!
//! This daemon:
//! 1. Loads the config file named by `--conf` (JSON or TOML)
//! 2. Opens and warms up the frame source
//! 3. Runs background-model motion detection on every frame
//! 4. Uploads an annotated snapshot when motion persists past the debounce window
//! 5. Stops cleanly on Ctrl-C or when a recorded source runs out

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use motion_sentry::{open_source, run, Pipeline, PreviewWriter, RunOptions, SentryConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON or TOML configuration file.
    #[arg(short, long, env = "SENTRY_CONFIG")]
    conf: PathBuf,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = SentryConfig::load(&args.conf)?;
    log::info!(
        "config {}: {}x{}@{}fps delta_thresh={} min_area={} min_upload={:?} min_motion_frames={}",
        args.conf.display(),
        cfg.source.width,
        cfg.source.height,
        cfg.source.fps,
        cfg.detection.delta_thresh,
        cfg.detection.min_area,
        cfg.occupancy.min_upload_interval,
        cfg.occupancy.min_motion_frames
    );

    let mut source = open_source(&cfg.source)?;
    log::info!(
        "warming up {} for {:?}",
        source.describe(),
        cfg.source.warmup
    );
    source.warm_up(cfg.source.warmup)?;
    log::info!("warm-up complete");

    let mut pipeline = Pipeline::from_config(&cfg, Instant::now())?;
    match cfg.upload.target.base_path() {
        Some(base) if pipeline.uploads_enabled() => log::info!("uploading snapshots to {}", base),
        _ => log::info!("uploads disabled"),
    }

    let mut preview = if cfg.display.show_video {
        let writer = PreviewWriter::new(&cfg.display.preview_path)?;
        log::info!("live preview at {}", writer.path().display());
        Some(writer)
    } else {
        None
    };

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    log::info!("sentryd running on {}", source.describe());
    let summary = run(
        source.as_mut(),
        &mut pipeline,
        preview.as_mut(),
        &stop,
        &RunOptions {
            max_frames: args.max_frames,
        },
    )?;

    let source_stats = source.stats();
    let stats = pipeline.finish_uploads();
    log::info!(
        "stopped ({:?}): frames_read={} captured={} motion_frames={} decisions={} uploads_ok={} uploads_failed={}",
        summary.reason,
        summary.frames_read,
        source_stats.frames_captured,
        stats.motion_frames,
        stats.decisions,
        stats.uploads_ok,
        stats.uploads_failed
    );
    Ok(())
}
