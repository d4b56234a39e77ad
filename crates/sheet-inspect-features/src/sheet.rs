//! Largest quadrilateral outline in the frame.

use crate::imgproc::{approx_poly_dp, arc_length, bounding_rect, canny, find_external_contours};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{GrayImageView, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetParams {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f32,
}

impl Default for SheetParams {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            approx_epsilon_frac: 0.04,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetOutline {
    pub rect: Rect,
    pub width_px: f32,
    pub height_px: f32,
}

#[derive(Clone, Debug, Default)]
pub struct SheetDetector {
    params: SheetParams,
}

impl SheetDetector {
    pub fn new(params: SheetParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SheetParams {
        &self.params
    }

    /// Bounding rect of the largest contour that simplifies to four vertices.
    pub fn detect(&self, gray: &GrayImageView<'_>) -> Option<SheetOutline> {
        let p = &self.params;
        let edges = canny(gray, p.canny_low, p.canny_high);
        let mask = GrayImageView {
            width: edges.width,
            height: edges.height,
            data: &edges.data,
        };

        let mut best: Option<Rect> = None;
        for contour in find_external_contours(&mask) {
            let eps = p.approx_epsilon_frac * arc_length(&contour, true);
            let approx = approx_poly_dp(&contour, eps, true);
            if approx.len() != 4 {
                continue;
            }
            let Some(rect) = bounding_rect(&approx) else {
                continue;
            };
            if best.is_none_or(|b| rect.area() > b.area()) {
                best = Some(rect);
            }
        }
        let rect = best?;
        log::debug!("sheet outline {}x{} px", rect.width, rect.height);
        Some(SheetOutline {
            rect,
            width_px: rect.width,
            height_px: rect.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_inspect_core::GrayImage;

    fn fill(img: &mut GrayImage, x0: usize, y0: usize, x1: usize, y1: usize, v: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.set(x, y, v);
            }
        }
    }

    #[test]
    fn picks_the_largest_rectangle() {
        let mut img = GrayImage::new(200, 150, 30);
        fill(&mut img, 20, 20, 180, 130, 200);
        fill(&mut img, 150, 5, 170, 15, 200);
        let sheet = SheetDetector::default().detect(&img.view()).expect("sheet");
        assert!((sheet.rect.x - 19.0).abs() <= 1.0, "{sheet:?}");
        assert!((sheet.rect.y - 19.0).abs() <= 1.0, "{sheet:?}");
        assert!((sheet.width_px - 161.0).abs() <= 2.0, "{sheet:?}");
        assert!((sheet.height_px - 111.0).abs() <= 2.0, "{sheet:?}");
    }

    #[test]
    fn no_outline_on_a_blank_frame() {
        let img = GrayImage::new(64, 48, 120);
        assert!(SheetDetector::default().detect(&img.view()).is_none());
    }
}
