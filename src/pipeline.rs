//! Per-frame driver.
//!
//! `Pipeline` owns all state that persists across frames (background model, occupancy
//! state machine, uploader) and runs one frame at a time:
//!
//! prepare -> background update -> extract -> annotate -> decide -> upload
//!
//! The first frame only seeds the background model. A frame is either processed
//! completely or rejected before any state changes, so stopping between frames never
//! leaves the model or the state machine half-updated.

use anyhow::Result;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::annotate::Annotator;
use crate::config::SentryConfig;
use crate::detect::{BackgroundModel, DetectionResult, MotionExtractor};
use crate::error::PipelineError;
use crate::frame::{prepare, Frame};
use crate::ingest::FrameSource;
use crate::occupancy::{OccupancySettings, OccupancyStateMachine, UploadDecision};
use crate::preview::PreviewWriter;
use crate::upload::{self, destination_path, encode_jpeg, Uploader};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub resize_width: u32,
    pub alpha: f32,
    pub delta_thresh: u8,
    pub min_area: u64,
    pub occupancy: OccupancySettings,
}

impl PipelineSettings {
    pub fn from_config(cfg: &SentryConfig) -> Self {
        Self {
            resize_width: cfg.detection.resize_width,
            alpha: cfg.detection.alpha,
            delta_thresh: cfg.detection.delta_thresh,
            min_area: cfg.detection.min_area,
            occupancy: cfg.occupancy,
        }
    }
}

/// Uploader plus the base its destinations are built under.
pub struct UploadSink {
    pub uploader: Box<dyn Uploader>,
    pub base_path: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub motion_frames: u64,
    pub decisions: u64,
    /// Stored, including uploads a background queue has finished.
    pub uploads_ok: u64,
    pub uploads_failed: u64,
    /// Handed to a background queue; each later lands in `uploads_ok` or `uploads_failed`.
    pub uploads_queued: u64,
}

#[derive(Debug)]
pub enum FrameOutcome {
    /// First frame; seeded the background model, nothing else ran.
    ModelInitialized,
    Processed(ProcessedFrame),
}

#[derive(Debug)]
pub struct ProcessedFrame {
    pub detection: DetectionResult,
    pub decision: Option<UploadDecision>,
    pub upload: UploadOutcome,
    pub annotated: RgbImage,
    pub timestamp_text: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    NotRequested,
    /// Decision made with no uploader configured.
    Skipped,
    Stored { destination: String },
    /// Accepted by a background queue; the outcome shows up in `PipelineStats` later.
    Queued { destination: String },
    Failed { destination: String, error: String },
}

pub struct Pipeline {
    settings: PipelineSettings,
    background: BackgroundModel,
    extractor: MotionExtractor,
    occupancy: OccupancyStateMachine,
    annotator: Annotator,
    sink: Option<UploadSink>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        started_at: Instant,
        annotator: Annotator,
        sink: Option<UploadSink>,
    ) -> Result<Self, PipelineError> {
        let background = BackgroundModel::new(settings.alpha)?;
        let occupancy = OccupancyStateMachine::new(settings.occupancy, started_at);
        Ok(Self {
            settings,
            background,
            extractor: MotionExtractor::new(),
            occupancy,
            annotator,
            sink,
            stats: PipelineStats::default(),
        })
    }

    /// Build from config: font, uploader stack and thresholds.
    pub fn from_config(cfg: &SentryConfig, started_at: Instant) -> Result<Self> {
        let annotator = match &cfg.display.font_path {
            Some(path) => Annotator::from_font_file(path)?,
            None => Annotator::new(),
        };
        let sink = match (
            upload::from_settings(&cfg.upload)?,
            cfg.upload.target.base_path(),
        ) {
            (Some(uploader), Some(base_path)) => Some(UploadSink {
                uploader,
                base_path,
            }),
            _ => None,
        };
        Ok(Self::new(
            PipelineSettings::from_config(cfg),
            started_at,
            annotator,
            sink,
        )?)
    }

    pub fn stats(&self) -> PipelineStats {
        let mut stats = self.stats;
        if let Some(done) = self
            .sink
            .as_ref()
            .and_then(|sink| sink.uploader.background_stats())
        {
            stats.uploads_ok += done.uploaded;
            stats.uploads_failed += done.failed;
        }
        stats
    }

    /// Wait for queued uploads to finish and return the final stats. Uploads after this
    /// fail on a queued uploader.
    pub fn finish_uploads(&mut self) -> PipelineStats {
        if let Some(sink) = self.sink.as_mut() {
            sink.uploader.flush();
        }
        self.stats()
    }

    pub fn occupancy(&self) -> &OccupancyStateMachine {
        &self.occupancy
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn uploads_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutcome, PipelineError> {
        self.occupancy.ensure_monotonic(frame.captured_at)?;
        let prepared = prepare(frame, self.settings.resize_width);

        if !self.background.is_initialized() {
            self.background.initialize(&prepared.gray)?;
            self.occupancy.note_observed(frame.captured_at)?;
            return Ok(FrameOutcome::ModelInitialized);
        }

        let delta = self.background.update(&prepared.gray)?;
        let detection =
            self.extractor
                .extract(&delta, self.settings.delta_thresh, self.settings.min_area);
        let timestamp_text = frame.timestamp_text();
        let annotated = self
            .annotator
            .annotate(&prepared.color, &detection, &timestamp_text);

        let decision = self
            .occupancy
            .observe(detection.occupied, frame.captured_at)?;

        self.stats.frames += 1;
        if detection.occupied {
            self.stats.motion_frames += 1;
        }
        let upload = match decision {
            Some(_) => {
                self.stats.decisions += 1;
                self.upload_snapshot(&annotated, &timestamp_text)
            }
            None => UploadOutcome::NotRequested,
        };

        Ok(FrameOutcome::Processed(ProcessedFrame {
            detection,
            decision,
            upload,
            annotated,
            timestamp_text,
        }))
    }

    /// Upload failures are logged and counted, never propagated: the decision has
    /// already consumed the debounce window.
    fn upload_snapshot(&mut self, annotated: &RgbImage, timestamp_text: &str) -> UploadOutcome {
        let Some(sink) = self.sink.as_mut() else {
            log::info!("upload decision at {} (uploads disabled)", timestamp_text);
            return UploadOutcome::Skipped;
        };
        let destination = destination_path(&sink.base_path, timestamp_text);
        let result = encode_jpeg(annotated)
            .and_then(|bytes| sink.uploader.upload(&bytes, &destination));
        match result {
            Ok(()) if sink.uploader.background_stats().is_some() => {
                self.stats.uploads_queued += 1;
                log::debug!("queued {} for {}", destination, sink.uploader.name());
                UploadOutcome::Queued { destination }
            }
            Ok(()) => {
                self.stats.uploads_ok += 1;
                log::info!("[UPLOAD] {} via {}", timestamp_text, sink.uploader.name());
                UploadOutcome::Stored { destination }
            }
            Err(e) => {
                self.stats.uploads_failed += 1;
                log::warn!("upload of {} failed: {}", destination, e);
                UploadOutcome::Failed {
                    destination,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub max_frames: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    MaxFrames,
    SourceExhausted,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub frames_read: u64,
    pub stats: PipelineStats,
    pub reason: StopReason,
}

/// Drive `pipeline` from `source` until the stop flag is set, `max_frames` frames were
/// read, or a finite source runs out. Source and model errors abort the run.
pub fn run(
    source: &mut dyn FrameSource,
    pipeline: &mut Pipeline,
    mut preview: Option<&mut PreviewWriter>,
    stop: &AtomicBool,
    options: &RunOptions,
) -> Result<RunSummary, PipelineError> {
    let mut frames_read = 0u64;
    let mut last_health_log = Instant::now();

    let reason = loop {
        if stop.load(Ordering::SeqCst) {
            break StopReason::Signal;
        }
        if options.max_frames.is_some_and(|max| frames_read >= max) {
            break StopReason::MaxFrames;
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(PipelineError::SourceExhausted) => break StopReason::SourceExhausted,
            Err(e) => return Err(e),
        };
        frames_read += 1;

        match pipeline.process(&frame)? {
            FrameOutcome::ModelInitialized => {
                log::info!("starting background model from {}", source.describe());
            }
            FrameOutcome::Processed(processed) => {
                if let Some(preview) = preview.as_deref_mut() {
                    if let Err(e) = preview.write(&processed.annotated) {
                        log::warn!("preview write failed: {:#}", e);
                    }
                }
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = pipeline.stats();
            log::info!(
                "source={} frames={} motion={} decisions={} uploads_ok={} uploads_failed={} uploads_queued={}",
                source.describe(),
                stats.frames,
                stats.motion_frames,
                stats.decisions,
                stats.uploads_ok,
                stats.uploads_failed,
                stats.uploads_queued
            );
            last_health_log = Instant::now();
        }
    };

    Ok(RunSummary {
        frames_read,
        stats: pipeline.stats(),
        reason,
    })
}
