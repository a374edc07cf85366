//! Running-average background model.
//!
//! The model keeps one `f32` per pixel and folds every new luminance frame into it with
//! exponential smoothing: `average = (1 - alpha) * average + alpha * gray`. The delta
//! returned for a frame is computed against the average *after* that frame has been
//! folded in, rounded and clamped back to 8 bits.

use image::{GrayImage, ImageBuffer, Luma};

use crate::error::PipelineError;

pub const DEFAULT_ALPHA: f32 = 0.5;

type AverageImage = ImageBuffer<Luma<f32>, Vec<f32>>;

pub struct BackgroundModel {
    alpha: f32,
    average: Option<AverageImage>,
}

impl BackgroundModel {
    pub fn new(alpha: f32) -> Result<Self, PipelineError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(PipelineError::InvalidAlpha(alpha));
        }
        Ok(Self {
            alpha,
            average: None,
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_initialized(&self) -> bool {
        self.average.is_some()
    }

    /// Dimensions fixed at initialization.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.average.as_ref().map(|avg| avg.dimensions())
    }

    /// Seed the average with the first trusted frame.
    pub fn initialize(&mut self, first: &GrayImage) -> Result<(), PipelineError> {
        if self.average.is_some() {
            return Err(PipelineError::AlreadyInitialized);
        }
        let (width, height) = first.dimensions();
        let average =
            AverageImage::from_fn(width, height, |x, y| Luma([first.get_pixel(x, y).0[0] as f32]));
        self.average = Some(average);
        log::info!("background model initialized at {}x{}", width, height);
        Ok(())
    }

    /// Fold `gray` into the average and return `|gray - round(average)|`.
    ///
    /// On error the average is left untouched.
    pub fn update(&mut self, gray: &GrayImage) -> Result<GrayImage, PipelineError> {
        let average = self
            .average
            .as_mut()
            .ok_or(PipelineError::UninitializedModel)?;
        if average.dimensions() != gray.dimensions() {
            return Err(PipelineError::DimensionMismatch {
                expected: average.dimensions(),
                actual: gray.dimensions(),
            });
        }

        let alpha = self.alpha;
        let (width, height) = gray.dimensions();
        let mut delta = GrayImage::new(width, height);
        for ((avg, src), out) in average
            .iter_mut()
            .zip(gray.as_raw().iter())
            .zip(delta.iter_mut())
        {
            let sample = *src as f32;
            *avg = (1.0 - alpha) * *avg + alpha * sample;
            let background = avg.round().clamp(0.0, 255.0) as u8;
            *out = src.abs_diff(background);
        }
        Ok(delta)
    }

    /// Current background value at a pixel, for diagnostics.
    pub fn average_at(&self, x: u32, y: u32) -> Option<f32> {
        let avg = self.average.as_ref()?;
        if x >= avg.width() || y >= avg.height() {
            return None;
        }
        Some(avg.get_pixel(x, y).0[0])
    }
}
