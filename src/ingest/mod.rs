//! Frame acquisition.
//!
//! Sources selected by URL:
//! - `stub://<name>`: synthetic scene with periodic motion (testing, demos)
//! - a local directory: recorded frames replayed in file-name order
//! - `http(s)://`: JPEG snapshot endpoint of an IP camera (feature: ingest-http)
//!
//! Every source emits frames at the configured resolution. Camera drivers and video
//! decoding live outside this crate; a source only hands over decoded pixels.

pub mod file;
#[cfg(feature = "ingest-http")]
pub mod http;
pub mod synthetic;

use anyhow::Result;
use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::{Duration, Instant};

use crate::config::SourceSettings;
use crate::error::PipelineError;
use crate::frame::Frame;

pub use file::DirectorySource;
#[cfg(feature = "ingest-http")]
pub use http::HttpSnapshotSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

pub trait FrameSource {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), PipelineError>;

    /// Block until the sensor output can be trusted.
    fn warm_up(&mut self, duration: Duration) -> Result<(), PipelineError> {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
        Ok(())
    }

    /// Next frame, `SourceExhausted` at the end of a finite source.
    fn next_frame(&mut self) -> Result<Frame, PipelineError>;

    fn stats(&self) -> SourceStats;
}

#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Open and configure the source named by `settings.url`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let url = settings.url.trim();
    let mut source: Box<dyn FrameSource> = if let Some(name) = url.strip_prefix("stub://") {
        Box::new(SyntheticSource::new(SyntheticConfig::live(name)))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        #[cfg(feature = "ingest-http")]
        {
            Box::new(HttpSnapshotSource::new(url)?)
        }
        #[cfg(not(feature = "ingest-http"))]
        {
            anyhow::bail!("http sources require the ingest-http feature")
        }
    } else if url.contains("://") {
        anyhow::bail!("unsupported source '{}'", url)
    } else {
        Box::new(DirectorySource::open(url)?)
    };
    source.configure(settings.width, settings.height, settings.fps)?;
    Ok(source)
}

pub(crate) fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

pub(crate) fn fit_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Triangle)
    }
}

/// Sleeps so that consecutive frames are at least one interval apart.
pub(crate) struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(fps: u32) -> Self {
        Self {
            interval: frame_interval(fps),
            last: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        if let Some(last) = self.last {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Clock for recorded or simulated footage: frame `n` is stamped `n / fps` after the
/// first, however fast frames are actually produced.
pub(crate) struct ReplayClock {
    start_instant: Instant,
    start_wall: DateTime<Local>,
    interval: Duration,
    ticks: u32,
}

impl ReplayClock {
    pub(crate) fn new(fps: u32) -> Self {
        Self {
            start_instant: Instant::now(),
            start_wall: Local::now(),
            interval: frame_interval(fps),
            ticks: 0,
        }
    }

    pub(crate) fn set_fps(&mut self, fps: u32) {
        self.interval = frame_interval(fps);
    }

    pub(crate) fn tick(&mut self) -> (Instant, DateTime<Local>) {
        let offset = self.interval * self.ticks;
        self.ticks += 1;
        let wall = chrono::Duration::from_std(offset)
            .map(|d| self.start_wall + d)
            .unwrap_or(self.start_wall);
        (self.start_instant + offset, wall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_clock_advances_one_interval_per_frame() {
        let mut clock = ReplayClock::new(10);
        let (i0, w0) = clock.tick();
        let (i1, w1) = clock.tick();
        let (i2, _) = clock.tick();
        assert_eq!(i1 - i0, Duration::from_millis(100));
        assert_eq!(i2 - i0, Duration::from_millis(200));
        assert_eq!((w1 - w0).num_milliseconds(), 100);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let settings = SourceSettings {
            url: "rtsp://camera".into(),
            width: 64,
            height: 48,
            fps: 10,
            warmup: Duration::ZERO,
        };
        assert!(open_source(&settings).is_err());
    }

    #[test]
    fn stub_url_opens_configured_synthetic_source() {
        let settings = SourceSettings {
            url: "stub://porch".into(),
            width: 64,
            height: 48,
            fps: 10,
            warmup: Duration::ZERO,
        };
        let mut source = open_source(&settings).unwrap();
        assert!(source.describe().contains("porch"));
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }
}
