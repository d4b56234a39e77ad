//! Circular hole candidates from a gray frame.

use crate::imgproc::{gaussian_blur, hough_circles, HoughCircle, HoughCircleParams};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{Circle, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for [`HoleDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoleDetectorParams {
    /// Gaussian pre-blur kernel size (odd, px).
    pub blur_ksize: usize,
    pub blur_sigma: f64,
    /// Minimum center distance is `rows / min_dist_divisor`.
    pub min_dist_divisor: f32,
    pub canny_high: f32,
    pub accumulator_threshold: u32,
    pub min_radius_px: u32,
    pub max_radius_px: u32,
    pub dp: f32,
}

impl Default for HoleDetectorParams {
    fn default() -> Self {
        Self {
            blur_ksize: 9,
            blur_sigma: 2.0,
            min_dist_divisor: 8.0,
            canny_high: 100.0,
            accumulator_threshold: 30,
            min_radius_px: 10,
            max_radius_px: 50,
            dp: 1.0,
        }
    }
}

impl HoleDetectorParams {
    fn hough(&self, rows: usize) -> HoughCircleParams {
        HoughCircleParams {
            dp: self.dp,
            min_dist: rows as f32 / self.min_dist_divisor.max(f32::EPSILON),
            canny_high: self.canny_high,
            acc_threshold: self.accumulator_threshold,
            min_radius: self.min_radius_px,
            max_radius: self.max_radius_px,
        }
    }
}

/// One detected hole, pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoleCandidate {
    pub center: Point2<f32>,
    pub radius: f32,
    pub votes: u32,
}

impl HoleCandidate {
    pub fn circle(&self) -> Circle {
        Circle {
            center: self.center,
            radius: self.radius,
        }
    }

    pub fn diameter_px(&self) -> f32 {
        2.0 * self.radius
    }
}

impl From<HoughCircle> for HoleCandidate {
    fn from(c: HoughCircle) -> Self {
        Self {
            center: c.center,
            radius: c.radius,
            votes: c.votes,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HoleDetector {
    params: HoleDetectorParams,
}

impl HoleDetector {
    pub fn new(params: HoleDetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HoleDetectorParams {
        &self.params
    }

    /// Blur, then run the gradient Hough transform; strongest holes first.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, gray), fields(width = gray.width, height = gray.height))
    )]
    pub fn detect(&self, gray: &GrayImageView<'_>) -> Vec<HoleCandidate> {
        let p = &self.params;
        let blurred = gaussian_blur(gray, p.blur_ksize, p.blur_sigma);
        let holes: Vec<HoleCandidate> = hough_circles(&blurred.view(), &p.hough(gray.height))
            .into_iter()
            .map(HoleCandidate::from)
            .collect();
        log::debug!("holes: {} found", holes.len());
        holes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_inspect_core::GrayImage;

    fn plate_with_holes(holes: &[(f32, f32, f32)]) -> GrayImage {
        let mut img = GrayImage::new(240, 180, 205);
        for y in 0..180 {
            for x in 0..240 {
                for &(cx, cy, r) in holes {
                    let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                    if dx * dx + dy * dy <= r * r {
                        img.set(x, y, 25);
                    }
                }
            }
        }
        img
    }

    #[test]
    fn default_params_follow_the_reference_pipeline() {
        let p = HoleDetectorParams::default();
        assert_eq!((p.blur_ksize, p.blur_sigma), (9, 2.0));
        assert_eq!(p.hough(480).min_dist, 60.0);
        assert_eq!((p.min_radius_px, p.max_radius_px), (10, 50));
    }

    #[test]
    fn detects_three_holes() {
        let img = plate_with_holes(&[(50.0, 50.0, 18.0), (150.0, 60.0, 24.0), (110.0, 130.0, 30.0)]);
        let holes = HoleDetector::default().detect(&img.view());
        assert_eq!(holes.len(), 3, "{holes:?}");
        for (cx, cy, r) in [(50.0, 50.0, 18.0), (150.0, 60.0, 24.0), (110.0, 130.0, 30.0)] {
            let h = holes
                .iter()
                .find(|h| (h.center - Point2::new(cx, cy)).norm() < 2.0)
                .unwrap_or_else(|| panic!("no hole near ({cx}, {cy}): {holes:?}"));
            assert!((h.radius - r).abs() < 1.5, "{h:?}");
        }
        assert!(holes.windows(2).all(|w| w[0].votes >= w[1].votes));
    }

    #[test]
    fn holes_outside_the_radius_range_are_ignored() {
        let img = plate_with_holes(&[(120.0, 90.0, 5.0)]);
        assert!(HoleDetector::default().detect(&img.view()).is_empty());
    }

    #[test]
    fn params_load_partially_from_json() {
        let p: HoleDetectorParams =
            serde_json::from_str(r#"{ "max_radius_px": 80 }"#).expect("json");
        assert_eq!(p.max_radius_px, 80);
        assert_eq!(p.accumulator_threshold, 30);
    }
}
