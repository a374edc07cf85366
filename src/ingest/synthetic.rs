//! Synthetic scene (`stub://`) for tests and demos.
//!
//! A static horizontal gradient with a little sensor noise. Every `motion_period` frames
//! a bright block enters from the left and crosses the scene over `motion_frames` frames.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::{FrameSource, Pacer, ReplayClock, SourceStats};
use crate::error::PipelineError;
use crate::frame::Frame;

const NOISE_SEED: u64 = 0x5EED_F00D;
const BLOCK_LEVEL: u8 = 235;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Frames from one motion event to the next.
    pub motion_period: u64,
    /// Frames the block spends crossing the scene.
    pub motion_frames: u64,
    /// Peak per-channel noise amplitude.
    pub noise: u8,
    /// Real-time pacing with wall-clock stamps. Unpaced sources use a replay clock.
    pub paced: bool,
}

impl SyntheticConfig {
    pub fn live(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 640,
            height: 480,
            fps: 16,
            motion_period: 200,
            motion_frames: 60,
            noise: 2,
            paced: true,
        }
    }

    pub fn replay(name: &str) -> Self {
        Self {
            paced: false,
            ..Self::live(name)
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    rng: StdRng,
    pacer: Pacer,
    clock: ReplayClock,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let pacer = Pacer::new(config.fps);
        let clock = ReplayClock::new(config.fps);
        Self {
            config,
            frame_count: 0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
            pacer,
            clock,
        }
    }

    /// Whether frame `index` (zero-based) shows the moving block.
    pub fn shows_motion(&self, index: u64) -> bool {
        let period = self.config.motion_period.max(1);
        let phase = index % period;
        index >= period && phase < self.config.motion_frames
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        let noise = self.config.noise as i16;
        let mut image = RgbImage::from_fn(width, height, |x, _| {
            let level = 60 + (x * 80 / width.max(1)) as u8;
            Rgb([level, level, level])
        });
        if noise > 0 {
            for pixel in image.pixels_mut() {
                let jitter: i16 = self.rng.gen_range(-noise..=noise);
                for channel in pixel.0.iter_mut() {
                    *channel = (*channel as i16 + jitter).clamp(0, 255) as u8;
                }
            }
        }

        if self.shows_motion(index) {
            let period = self.config.motion_period.max(1);
            let phase = index % period;
            let block_w = (width / 4).max(1);
            let block_h = (height / 3).max(1);
            let travel = width.saturating_sub(block_w) as u64;
            let x0 = (travel * phase / self.config.motion_frames.max(1)) as u32;
            let y0 = height / 3;
            for y in y0..(y0 + block_h).min(height) {
                for x in x0..(x0 + block_w).min(width) {
                    image.put_pixel(x, y, Rgb([BLOCK_LEVEL, BLOCK_LEVEL, BLOCK_LEVEL]));
                }
            }
        }
        image
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{} (synthetic)", self.config.name)
    }

    fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), PipelineError> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(PipelineError::source("resolution and fps must be non-zero"));
        }
        self.config.width = width;
        self.config.height = height;
        self.config.fps = fps;
        self.pacer = Pacer::new(fps);
        self.clock.set_fps(fps);
        Ok(())
    }

    fn warm_up(&mut self, duration: Duration) -> Result<(), PipelineError> {
        if self.config.paced && !duration.is_zero() {
            std::thread::sleep(duration);
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, PipelineError> {
        let index = self.frame_count;
        self.frame_count += 1;
        let image = self.render(index);
        if self.config.paced {
            self.pacer.wait();
            Ok(Frame::captured_now(image))
        } else {
            let (captured_at, timestamp) = self.clock.tick();
            Ok(Frame::new(image, captured_at, timestamp))
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.describe(),
        }
    }
}
