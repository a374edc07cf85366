//! Foreground extraction from a background delta image.
//!
//! Steps, all on the normalized frame:
//! 1. Binarize: delta >= threshold is foreground.
//! 2. Dilate with a 3x3 square element, `dilate_iterations` times, closing small gaps.
//! 3. Trace borders and keep only outermost contours (blobs inside holes are ignored).
//! 4. Bounding box per contour, dropped when width * height < min_area.
//!
//! Regions come out in border-following discovery order, i.e. a raster scan from the
//! top-left. Nothing beyond display should depend on that order.

use image::{GrayImage, Luma};
use imageproc::contours::{self, Contour};
use imageproc::distance_transform::Norm;

use super::result::{DetectionResult, Region};

pub const DEFAULT_DILATE_ITERATIONS: u8 = 2;

const FOREGROUND: u8 = 255;

#[derive(Clone, Copy, Debug)]
pub struct MotionExtractor {
    dilate_iterations: u8,
}

impl Default for MotionExtractor {
    fn default() -> Self {
        Self {
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
        }
    }
}

impl MotionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, delta: &GrayImage, threshold: u8, min_area: u64) -> DetectionResult {
        let mask = binarize(delta, threshold);
        let mask = if self.dilate_iterations > 0 {
            // LInf radius k equals k passes of a 3x3 square element.
            imageproc::morphology::dilate(&mask, Norm::LInf, self.dilate_iterations)
        } else {
            mask
        };

        let regions = contours::find_contours::<u32>(&mask)
            .iter()
            .filter(|contour| contour.parent.is_none())
            .filter_map(bounding_region)
            .filter(|region| region.area() >= min_area)
            .collect();
        DetectionResult::from_regions(regions)
    }
}

fn binarize(delta: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = delta.clone();
    for pixel in mask.pixels_mut() {
        *pixel = if pixel.0[0] >= threshold {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        };
    }
    mask
}

fn bounding_region(contour: &Contour<u32>) -> Option<Region> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points[1..] {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(Region::new(
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(image: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                image.put_pixel(xx, yy, Luma([value]));
            }
        }
    }

    #[test]
    fn quiet_delta_is_unoccupied() {
        let delta = GrayImage::from_pixel(200, 150, Luma([3]));
        let result = MotionExtractor::new().extract(&delta, 5, 10);
        assert!(!result.occupied);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn block_is_reported_grown_by_dilation() {
        let mut delta = GrayImage::new(200, 150);
        fill(&mut delta, 50, 40, 100, 60, 40);
        let result = MotionExtractor::new().extract(&delta, 25, 5000);
        assert!(result.occupied);
        assert_eq!(result.regions, vec![Region::new(48, 38, 104, 64)]);
    }

    #[test]
    fn pixel_at_threshold_counts_as_foreground() {
        let mut delta = GrayImage::new(40, 40);
        fill(&mut delta, 10, 10, 10, 10, 25);
        let at = MotionExtractor::new().extract(&delta, 25, 1);
        let above = MotionExtractor::new().extract(&delta, 26, 1);
        assert!(at.occupied);
        assert!(!above.occupied);
    }

    #[test]
    fn small_regions_never_surface() {
        let mut delta = GrayImage::new(300, 200);
        fill(&mut delta, 10, 10, 8, 8, 200);
        let only_small = MotionExtractor::new().extract(&delta, 25, 5000);
        assert!(!only_small.occupied);

        fill(&mut delta, 120, 80, 120, 80, 200);
        let mixed = MotionExtractor::new().extract(&delta, 25, 5000);
        assert!(mixed.occupied);
        assert_eq!(mixed.regions.len(), 1);
        assert!(mixed.regions[0].area() >= 5000);
    }

    #[test]
    fn dilation_merges_nearby_blobs() {
        let mut delta = GrayImage::new(100, 60);
        fill(&mut delta, 10, 10, 20, 20, 90);
        fill(&mut delta, 33, 10, 20, 20, 90);
        let merged = MotionExtractor::new().extract(&delta, 25, 1);
        assert_eq!(merged.regions.len(), 1);
        assert_eq!(merged.regions[0], Region::new(8, 8, 47, 24));

        let undilated = MotionExtractor {
            dilate_iterations: 0,
        }
        .extract(&delta, 25, 1);
        assert_eq!(undilated.regions.len(), 2);
    }

    #[test]
    fn blobs_inside_holes_are_ignored() {
        let mut delta = GrayImage::new(140, 140);
        fill(&mut delta, 10, 10, 100, 10, 90);
        fill(&mut delta, 10, 100, 100, 10, 90);
        fill(&mut delta, 10, 10, 10, 100, 90);
        fill(&mut delta, 100, 10, 10, 100, 90);
        fill(&mut delta, 50, 50, 20, 20, 90);
        let result = MotionExtractor::new().extract(&delta, 25, 1);
        assert_eq!(result.regions, vec![Region::new(8, 8, 104, 104)]);
    }

    #[test]
    fn regions_follow_raster_discovery_order() {
        let mut delta = GrayImage::new(200, 200);
        fill(&mut delta, 150, 10, 20, 20, 90);
        fill(&mut delta, 10, 120, 20, 20, 90);
        let result = MotionExtractor::new().extract(&delta, 25, 1);
        assert_eq!(result.regions.len(), 2);
        assert!(result.regions[0].y < result.regions[1].y);
        assert_eq!(result.regions[0].x, 148);
    }
}
