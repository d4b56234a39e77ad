//! Alodine halo check in the ring around a hole.

use crate::holes::HoleCandidate;
use crate::imgproc::{rgb_to_hsv, HsvRange};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::RgbImageView;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlodineParams {
    /// Inner ring radius as a multiple of the hole radius.
    pub inner_radius_factor: f32,
    /// Outer ring radius as a multiple of the hole radius.
    pub outer_radius_factor: f32,
    /// Light-gray coating color.
    pub color: HsvRange,
    /// Ring fraction that must fall inside `color`.
    pub min_coverage: f32,
}

impl Default for AlodineParams {
    fn default() -> Self {
        Self {
            inner_radius_factor: 1.05,
            outer_radius_factor: 1.4,
            color: HsvRange {
                low: [0, 0, 150],
                high: [180, 45, 230],
            },
            min_coverage: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlodineResult {
    /// Fraction of ring pixels within the coating color range.
    pub coverage: f32,
    pub present: bool,
    /// Twice the (truncated) outer ring radius.
    pub outer_diameter_px: f32,
}

#[derive(Clone, Debug, Default)]
pub struct AlodineDetector {
    params: AlodineParams,
}

impl AlodineDetector {
    pub fn new(params: AlodineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AlodineParams {
        &self.params
    }

    /// Measure coating coverage in the annulus `(⌊fᵢ·r⌋, ⌊fₒ·r⌋]` around
    /// `hole`. An empty annulus (tiny hole, or ring entirely outside the
    /// frame) reports zero coverage and no halo.
    pub fn inspect(&self, rgb: &RgbImageView<'_>, hole: &HoleCandidate) -> AlodineResult {
        let p = &self.params;
        let inner = (hole.radius * p.inner_radius_factor).floor().max(0.0);
        let outer = (hole.radius * p.outer_radius_factor).floor().max(0.0);
        let outer_diameter_px = 2.0 * outer;
        let empty = AlodineResult {
            coverage: 0.0,
            present: false,
            outer_diameter_px,
        };
        if outer <= inner || rgb.width == 0 || rgb.height == 0 {
            return empty;
        }

        let (cx, cy) = (hole.center.x, hole.center.y);
        let x0 = (cx - outer).floor().max(0.0) as usize;
        let y0 = (cy - outer).floor().max(0.0) as usize;
        let x1 = ((cx + outer).ceil().max(0.0) as usize).min(rgb.width - 1);
        let y1 = ((cy + outer).ceil().max(0.0) as usize).min(rgb.height - 1);
        let (in2, out2) = (inner * inner, outer * outer);

        let (mut total, mut hits) = (0usize, 0usize);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                let d2 = dx * dx + dy * dy;
                if d2 <= in2 || d2 > out2 {
                    continue;
                }
                total += 1;
                if p.color.contains(rgb_to_hsv(rgb.pixel(x, y))) {
                    hits += 1;
                }
            }
        }
        if total == 0 {
            return empty;
        }
        let coverage = hits as f32 / total as f32;
        AlodineResult {
            coverage,
            present: coverage >= p.min_coverage,
            outer_diameter_px,
        }
    }
}
