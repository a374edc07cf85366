//! Recorded footage: a local directory of still frames.
//!
//! Files with a jpg/jpeg/png extension are replayed in file-name order, stamped by a
//! replay clock at the configured fps, and resized to the configured resolution. The
//! source is finite and reports `SourceExhausted` after the last file.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{fit_to, FrameSource, ReplayClock, SourceStats};
use crate::error::PipelineError;
use crate::frame::Frame;

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next_index: usize,
    width: u32,
    height: u32,
    clock: ReplayClock,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| anyhow!("failed to read frame directory {}: {}", dir.display(), e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no frame images in {}", dir.display()));
        }
        files.sort();
        log::info!("DirectorySource: {} frames in {}", files.len(), dir.display());
        Ok(Self {
            dir,
            files,
            next_index: 0,
            width: 0,
            height: 0,
            clock: ReplayClock::new(1),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), PipelineError> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(PipelineError::source("resolution and fps must be non-zero"));
        }
        self.width = width;
        self.height = height;
        self.clock.set_fps(fps);
        Ok(())
    }

    /// Recorded frames need no settling time.
    fn warm_up(&mut self, _duration: Duration) -> Result<(), PipelineError> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, PipelineError> {
        let path = self
            .files
            .get(self.next_index)
            .ok_or(PipelineError::SourceExhausted)?;
        let image = image::open(path)
            .map_err(|e| PipelineError::source(format!("decode {}: {}", path.display(), e)))?
            .into_rgb8();
        self.next_index += 1;
        let image = if self.width > 0 && self.height > 0 {
            fit_to(image, self.width, self.height)
        } else {
            image
        };
        let (captured_at, timestamp) = self.clock.tick();
        Ok(Frame::new(image, captured_at, timestamp))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next_index as u64,
            source: self.describe(),
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn replays_in_name_order_then_exhausts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(40, 30, Rgb([200, 0, 0])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(40, 30, Rgb([0, 200, 0])).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = DirectorySource::open(dir.path())?;
        assert_eq!(source.len(), 2);
        source.configure(20, 15, 4)?;

        let first = source.next_frame()?;
        assert_eq!(first.image().dimensions(), (20, 15));
        assert_eq!(first.image().get_pixel(10, 7).0[1], 200);
        let second = source.next_frame()?;
        assert_eq!(second.image().get_pixel(10, 7).0[0], 200);
        assert_eq!(second.captured_at - first.captured_at, Duration::from_millis(250));

        assert!(matches!(
            source.next_frame(),
            Err(PipelineError::SourceExhausted)
        ));
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn corrupt_frame_is_a_source_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg")?;
        let mut source = DirectorySource::open(dir.path())?;
        assert!(matches!(source.next_frame(), Err(PipelineError::Source(_))));
        Ok(())
    }

    #[test]
    fn empty_directory_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(DirectorySource::open(dir.path()).is_err());
        Ok(())
    }
}
