use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use motion_sentry::ingest::{DirectorySource, SyntheticConfig, SyntheticSource};
use motion_sentry::{
    run, Annotator, FrameSource, LocalUploader, OccupancySettings, Pipeline, PipelineError,
    PipelineSettings, RunOptions, StopReason, UploadError, UploadSink, Uploader,
};

#[derive(Clone, Default)]
struct CapturingUploader {
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl Uploader for CapturingUploader {
    fn name(&self) -> &'static str {
        "capturing"
    }

    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push((destination.to_string(), image.to_vec()));
        Ok(())
    }
}

fn settings(resize_width: u32, interval: Duration, frames: u32) -> PipelineSettings {
    PipelineSettings {
        resize_width,
        alpha: 0.5,
        delta_thresh: 25,
        min_area: 400,
        occupancy: OccupancySettings {
            min_upload_interval: interval,
            min_motion_frames: frames,
        },
    }
}

#[test]
fn one_upload_per_motion_event_on_synthetic_scene() {
    let started_at = Instant::now();
    let capture = CapturingUploader::default();
    let sink = UploadSink {
        uploader: Box::new(capture.clone()),
        base_path: "/Apps/sentry".to_string(),
    };
    let mut pipeline = Pipeline::new(
        settings(160, Duration::from_secs(1), 5),
        started_at,
        Annotator::new(),
        Some(sink),
    )
    .unwrap();

    let mut source = SyntheticSource::new(SyntheticConfig {
        width: 160,
        height: 120,
        fps: 10,
        motion_period: 20,
        motion_frames: 10,
        ..SyntheticConfig::replay("e2e")
    });

    let summary = run(
        &mut source,
        &mut pipeline,
        None,
        &AtomicBool::new(false),
        &RunOptions {
            max_frames: Some(60),
        },
    )
    .unwrap();

    assert_eq!(summary.reason, StopReason::MaxFrames);
    assert_eq!(summary.frames_read, 60);
    assert_eq!(summary.stats.frames, 59);
    assert_eq!(summary.stats.decisions, 2);
    assert_eq!(summary.stats.uploads_ok, 2);
    assert!(summary.stats.motion_frames >= 20);

    let uploads = capture.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_ne!(uploads[0].0, uploads[1].0);
    for (destination, bytes) in uploads.iter() {
        assert!(destination.starts_with("/Apps/sentry/"));
        assert!(destination.ends_with(".jpg"));
        let snapshot = image::load_from_memory(bytes).unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (160, 120));
    }
}

fn save_frames(dir: &Path, frames: &[RgbImage]) {
    for (i, frame) in frames.iter().enumerate() {
        frame
            .save(dir.join(format!("frame_{:03}.png", i)))
            .unwrap();
    }
}

fn room(with_person: bool) -> RgbImage {
    let mut image = RgbImage::from_pixel(160, 120, Rgb([50, 50, 50]));
    if with_person {
        for y in 30..90 {
            for x in 60..100 {
                image.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
    }
    image
}

#[test]
fn recorded_footage_stores_snapshot_in_local_directory() {
    let frames_dir = tempfile::tempdir().unwrap();
    let mut frames = vec![room(false); 12];
    // The person's delta halves every frame (95, 48, 24): only the first two clear 25.
    frames.extend(vec![room(true); 3]);
    frames.extend(vec![room(false); 3]);
    save_frames(frames_dir.path(), &frames);

    let out_dir = tempfile::tempdir().unwrap();
    let snapshots = out_dir.path().join("snapshots");
    let sink = UploadSink {
        uploader: Box::new(LocalUploader::new(&snapshots).unwrap()),
        base_path: snapshots.display().to_string(),
    };
    let started_at = Instant::now();
    let mut pipeline = Pipeline::new(
        settings(160, Duration::from_secs(1), 2),
        started_at,
        Annotator::new(),
        Some(sink),
    )
    .unwrap();

    let mut source = DirectorySource::open(frames_dir.path()).unwrap();
    source.configure(160, 120, 10).unwrap();

    let summary = run(
        &mut source,
        &mut pipeline,
        None,
        &AtomicBool::new(false),
        &RunOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.frames_read, 18);
    assert_eq!(summary.stats.decisions, 1);
    assert_eq!(summary.stats.uploads_ok, 1);

    let stored: Vec<_> = std::fs::read_dir(&snapshots)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].extension().and_then(|ext| ext.to_str()),
        Some("jpg")
    );
    let snapshot = image::open(&stored[0]).unwrap();
    assert_eq!((snapshot.width(), snapshot.height()), (160, 120));
}

#[test]
fn frame_size_change_aborts_the_run() {
    let frames_dir = tempfile::tempdir().unwrap();
    save_frames(
        frames_dir.path(),
        &[
            RgbImage::new(160, 120),
            RgbImage::new(160, 120),
            RgbImage::new(160, 90),
        ],
    );

    let mut pipeline = Pipeline::new(
        settings(80, Duration::ZERO, 1),
        Instant::now(),
        Annotator::new(),
        None,
    )
    .unwrap();
    // Unconfigured: frames keep their recorded size.
    let mut source = DirectorySource::open(frames_dir.path()).unwrap();

    let err = run(
        &mut source,
        &mut pipeline,
        None,
        &AtomicBool::new(false),
        &RunOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    assert_eq!(pipeline.stats().frames, 1);
}

#[test]
fn invalid_alpha_is_rejected_at_construction() {
    let mut bad = settings(160, Duration::ZERO, 1);
    bad.alpha = 0.0;
    assert!(matches!(
        Pipeline::new(bad, Instant::now(), Annotator::new(), None),
        Err(PipelineError::InvalidAlpha(_))
    ));
}
