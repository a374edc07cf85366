//! Captured frames and the fixed preprocessing applied before detection.
//!
//! - `Frame`: color pixels plus a monotonic capture instant and a wall-clock timestamp.
//! - `prepare`: resize to the normalized width, convert to luminance, blur.
//!
//! The monotonic instant drives the occupancy state machine. The wall-clock timestamp is
//! only used for the on-frame label and for naming uploaded snapshots.

use chrono::{DateTime, Local, TimeZone};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use std::fmt::Display;
use std::time::Instant;

/// Width every frame is normalized to before detection.
pub const DEFAULT_RESIZE_WIDTH: u32 = 500;

/// Gaussian sigma matching a 21x21 kernel with automatic sigma.
pub const BLUR_SIGMA: f32 = 3.5;

/// Label format, e.g. `Monday 19 October 2026 03:04:05PM`.
pub const TIMESTAMP_FORMAT: &str = "%A %d %B %Y %I:%M:%S%p";

/// A captured color frame. Pixels are never mutated after capture; every stage that
/// needs a different image derives a new one.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    /// Monotonic capture instant.
    pub captured_at: Instant,
    /// Wall-clock capture time.
    pub timestamp: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: Instant, timestamp: DateTime<Local>) -> Self {
        Self {
            image,
            captured_at,
            timestamp,
        }
    }

    /// Stamp a freshly acquired image with the current time.
    pub fn captured_now(image: RgbImage) -> Self {
        Self::new(image, Instant::now(), Local::now())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn timestamp_text(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Output of preprocessing: the resized color frame (annotated and uploaded later) and
/// the blurred luminance image fed to the background model.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub color: RgbImage,
    pub gray: GrayImage,
}

pub fn prepare(frame: &Frame, resize_width: u32) -> Prepared {
    let color = resize_to_width(frame.image(), resize_width);
    let gray = imageops::grayscale(&color);
    let gray = imageproc::filter::gaussian_blur_f32(&gray, BLUR_SIGMA);
    Prepared { color, gray }
}

/// Resize keeping aspect ratio. Height is rounded and never drops below one pixel.
pub fn resize_to_width(image: &RgbImage, width: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == width || w == 0 || width == 0 {
        return image.clone();
    }
    let height = ((h as f64 * width as f64 / w as f64).round() as u32).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}
