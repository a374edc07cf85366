//! Frame overlays: room status, capture time and region boxes.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detect::DetectionResult;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;
const STATUS_SCALE: f32 = 16.0;
const TIMESTAMP_SCALE: f32 = 12.0;

/// DejaVu Sans, used unless `font_path` names another TrueType font.
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Draws overlays onto copies of frames: region boxes, and the room status and timestamp
/// text when a font is loaded.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Boxes and text, with the bundled font.
    pub fn new() -> Self {
        match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Self::with_font(font),
            Err(e) => {
                log::warn!("bundled font unusable ({}), drawing boxes only", e);
                Self::boxes_only()
            }
        }
    }

    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self::with_font(font))
    }

    pub fn draws_text(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(
        &self,
        image: &RgbImage,
        detection: &DetectionResult,
        timestamp_text: &str,
    ) -> RgbImage {
        let mut canvas = image.clone();
        for region in &detection.regions {
            for inset in 0..BOX_THICKNESS {
                if region.width <= inset * 2 || region.height <= inset * 2 {
                    break;
                }
                let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
                    .of_size(region.width - inset * 2, region.height - inset * 2);
                draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
            }
        }

        if let Some(font) = &self.font {
            let status = format!("Room Status: {}", detection.status());
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                10,
                6,
                PxScale::from(STATUS_SCALE),
                font,
                &status,
            );
            let bottom = canvas.height() as i32 - 10 - TIMESTAMP_SCALE as i32;
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                10,
                bottom.max(0),
                PxScale::from(TIMESTAMP_SCALE),
                font,
                timestamp_text,
            );
        }
        canvas
    }
}
