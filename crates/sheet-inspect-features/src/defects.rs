//! Surface defects: deformations from the adaptive-threshold mask and
//! scratches from straight edge runs.

use crate::imgproc::{
    adaptive_threshold_mean, approx_poly_dp, arc_length, bounding_rect, canny, contour_area,
    find_external_contours, line_segments, SegmentParams,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{GrayImageView, LineSegment, Rect};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectParams {
    /// Side of the local-mean window of the threshold mask (px).
    pub threshold_block_size: usize,
    /// Contours at or below this area (px²) are ignored.
    pub min_contour_area_px: f32,
    pub approx_epsilon_frac: f32,
    /// Simplified polygons with more vertices than this are deformations.
    pub max_regular_vertices: usize,
    pub scratch_canny_low: f32,
    pub scratch_canny_high: f32,
    pub segments: SegmentParams,
}

impl Default for DefectParams {
    fn default() -> Self {
        Self {
            threshold_block_size: 11,
            min_contour_area_px: 100.0,
            approx_epsilon_frac: 0.04,
            max_regular_vertices: 4,
            scratch_canny_low: 50.0,
            scratch_canny_high: 150.0,
            segments: SegmentParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deformation {
    pub polygon: Vec<Point2<f32>>,
    pub bounding: Rect,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scratch {
    pub start: Point2<f32>,
    pub end: Point2<f32>,
    pub length_px: f32,
}

impl Scratch {
    pub fn segment(&self) -> LineSegment {
        LineSegment {
            start: self.start,
            end: self.end,
        }
    }
}

impl From<LineSegment> for Scratch {
    fn from(s: LineSegment) -> Self {
        Self {
            start: s.start,
            end: s.end,
            length_px: s.length(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DefectDetector {
    params: DefectParams,
}

impl DefectDetector {
    pub fn new(params: DefectParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DefectParams {
        &self.params
    }

    /// Irregular regions of the adaptive-threshold mask.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn deformations(&self, gray: &GrayImageView<'_>) -> Vec<Deformation> {
        let p = &self.params;
        let mask = adaptive_threshold_mean(gray, p.threshold_block_size);
        let out: Vec<Deformation> = find_external_contours(&mask.view())
            .into_iter()
            .filter(|c| contour_area(c) > p.min_contour_area_px)
            .filter_map(|c| {
                let eps = p.approx_epsilon_frac * arc_length(&c, true);
                let polygon = approx_poly_dp(&c, eps, true);
                if polygon.len() <= p.max_regular_vertices {
                    return None;
                }
                let bounding = bounding_rect(&c)?;
                Some(Deformation { polygon, bounding })
            })
            .collect();
        log::debug!("deformations: {}", out.len());
        out
    }

    /// Straight edge runs at least `segments.min_length_px` long.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn scratches(&self, gray: &GrayImageView<'_>) -> Vec<Scratch> {
        let p = &self.params;
        let edges = canny(gray, p.scratch_canny_low, p.scratch_canny_high);
        let out: Vec<Scratch> = line_segments(&edges, &p.segments)
            .into_iter()
            .map(Scratch::from)
            .collect();
        log::debug!("scratches: {}", out.len());
        out
    }
}
