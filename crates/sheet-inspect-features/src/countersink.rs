//! Hole classification: anodized, countersunk or plain.

use crate::holes::HoleCandidate;
use crate::imgproc::{canny, mean_rgb_in_circle};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{GrayImage, GrayImageView, Rect, RgbImageView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoleClass {
    Anodized,
    Countersink,
    Normal,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountersinkParams {
    /// Every interior channel mean must exceed this for an anodized hole.
    pub anodized_min_channel: f32,
    /// Pairwise channel means must differ by less than this.
    pub anodized_max_channel_diff: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Edge pixels in the hole's bounding box above which it is countersunk.
    pub edge_count_threshold: usize,
}

impl Default for CountersinkParams {
    fn default() -> Self {
        Self {
            anodized_min_channel: 100.0,
            anodized_max_channel_diff: 15.0,
            canny_low: 100.0,
            canny_high: 200.0,
            edge_count_threshold: 2000,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CountersinkClassifier {
    params: CountersinkParams,
}

impl CountersinkClassifier {
    pub fn new(params: CountersinkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CountersinkParams {
        &self.params
    }

    /// A bright, gray interior wins; otherwise a busy edge map around the
    /// hole marks a countersink.
    pub fn classify(
        &self,
        rgb: &RgbImageView<'_>,
        gray: &GrayImageView<'_>,
        hole: &HoleCandidate,
    ) -> HoleClass {
        if let Some(mean) = mean_rgb_in_circle(rgb, hole.center, hole.radius) {
            if self.is_anodized(mean) {
                return HoleClass::Anodized;
            }
        }
        if self.edge_count(gray, hole) > self.params.edge_count_threshold {
            HoleClass::Countersink
        } else {
            HoleClass::Normal
        }
    }

    pub fn is_anodized(&self, mean: [f32; 3]) -> bool {
        let p = &self.params;
        let [a, b, c] = mean;
        mean.iter().all(|&v| v > p.anodized_min_channel)
            && (a - b).abs() < p.anodized_max_channel_diff
            && (b - c).abs() < p.anodized_max_channel_diff
            && (a - c).abs() < p.anodized_max_channel_diff
    }

    /// Canny edge count over the hole's bounding square, clipped to the frame.
    pub fn edge_count(&self, gray: &GrayImageView<'_>, hole: &HoleCandidate) -> usize {
        let Some(roi) = crop(gray, &Rect::around_circle(hole.center, hole.radius)) else {
            return 0;
        };
        canny(&roi.view(), self.params.canny_low, self.params.canny_high).count()
    }
}

fn crop(src: &GrayImageView<'_>, rect: &Rect) -> Option<GrayImage> {
    let x0 = rect.x.max(0.0).floor() as usize;
    let y0 = rect.y.max(0.0).floor() as usize;
    let x1 = (rect.right().ceil().max(0.0) as usize).min(src.width);
    let y1 = (rect.bottom().ceil().max(0.0) as usize).min(src.height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (w, h) = (x1 - x0, y1 - y0);
    let mut out = GrayImage::new(w, h, 0);
    for y in 0..h {
        let row = &src.data[(y0 + y) * src.width + x0..(y0 + y) * src.width + x1];
        out.data[y * w..(y + 1) * w].copy_from_slice(row);
    }
    Some(out)
}
