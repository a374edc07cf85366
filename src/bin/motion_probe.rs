//! motion_probe - dry-run the detector over a source
//!
//! Replays frames through the same pipeline as `sentryd` with uploads switched off and
//! prints one JSON line per frame. Useful for tuning `delta_thresh`, `min_area` and the
//! debounce settings against recorded footage.

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use motion_sentry::config::UploadTarget;
use motion_sentry::ingest::{SyntheticConfig, SyntheticSource};
use motion_sentry::{open_source, FrameOutcome, FrameSource, Pipeline, PipelineError, SentryConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file; built-in defaults when omitted.
    #[arg(short, long, env = "SENTRY_CONFIG")]
    conf: Option<PathBuf>,

    /// Override the configured source (directory or stub://name).
    #[arg(long)]
    source: Option<String>,

    #[arg(long, default_value_t = 600)]
    max_frames: u64,

    /// Omit frames without motion or decision.
    #[arg(long)]
    only_motion: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.conf {
        Some(path) => SentryConfig::load(path)?,
        None => SentryConfig::defaults()?,
    };
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    cfg.upload.target = UploadTarget::Disabled;

    // Synthetic scenes run unpaced here; everything else opens as configured.
    let mut source: Box<dyn FrameSource> = match cfg.source.url.strip_prefix("stub://") {
        Some(name) => {
            let mut source = SyntheticSource::new(SyntheticConfig::replay(name));
            source.configure(cfg.source.width, cfg.source.height, cfg.source.fps)?;
            Box::new(source)
        }
        None => open_source(&cfg.source)?,
    };

    let mut pipeline = Pipeline::from_config(&cfg, Instant::now())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for index in 0..args.max_frames {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(PipelineError::SourceExhausted) => break,
            Err(e) => return Err(e.into()),
        };
        let processed = match pipeline.process(&frame)? {
            FrameOutcome::ModelInitialized => continue,
            FrameOutcome::Processed(processed) => processed,
        };
        if args.only_motion && !processed.detection.occupied && processed.decision.is_none() {
            continue;
        }
        let line = json!({
            "frame": index,
            "timestamp": processed.timestamp_text,
            "status": processed.detection.status().to_string(),
            "regions": processed.detection.regions,
            "consecutive_motion_frames": pipeline.occupancy().consecutive_motion_frames(),
            "upload": processed.decision.is_some(),
        });
        writeln!(out, "{}", line)?;
    }

    let stats = pipeline.stats();
    log::info!(
        "probed {} frames: motion={} decisions={}",
        stats.frames,
        stats.motion_frames,
        stats.decisions
    );
    Ok(())
}
