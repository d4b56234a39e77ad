//! Bit sampling and dictionary decoding of marker quads.

use crate::threshold::otsu_threshold_from_samples;
use crate::Matcher;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{homography_from_4pt, GrayImageView, Homography};
use std::collections::HashSet;

/// Decoder configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Marker border width in cells (OpenCV uses 1).
    pub border_bits: usize,
    /// Fraction of the quad side ignored near its edges.
    pub inset_frac: f32,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
    /// Maximum corrected bits; clamped to the dictionary capability.
    pub max_hamming: u8,
    /// Keep only the best detection per marker id.
    pub dedup_by_id: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.0,
            min_border_score: 0.85,
            max_hamming: 1,
            dedup_by_id: true,
        }
    }
}

/// One decoded marker.
#[derive(Clone, Debug)]
pub struct MarkerDetection {
    pub id: u32,
    pub rotation: u8,
    pub hamming: u8,
    pub score: f32,
    pub border_score: f32,
    /// Observed inner bits (row-major, black=1).
    pub code: u64,
    /// Whether polarity was inverted to maximize `border_score`.
    pub inverted: bool,
    /// Image corners in marker orientation (canonical TL, TR, BR, BL).
    pub corners: [Point2<f32>; 4],
}

#[derive(Clone, Copy, Debug)]
struct MarkerObservation {
    code: u64,
    border_score: f32,
    inverted: bool,
}

const MIN_SIDE_PX: f32 = 12.0;
const THRESH_SUBDIV: usize = 3;

/// Sample positions in the canonical `[0, side]²` cell frame.
struct SampleGrid {
    cells: usize,
    side: f32,
    points: Vec<Point2<f32>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f32>>,
}

impl SampleGrid {
    fn new(cfg: &DecodeConfig, bits: usize, side: f32) -> Option<Self> {
        let cells = bits + 2 * cfg.border_bits;
        if bits * bits > 64 || cells == 0 {
            return None;
        }

        let inset = (cfg.inset_frac.clamp(0.0, 0.4) * side).max(0.0);
        let inner = side - 2.0 * inset;
        if inner < MIN_SIDE_PX {
            return None;
        }

        let step = inner / cells as f32;
        let points = (0..cells * cells)
            .map(|i| {
                let (cx, cy) = (i % cells, i / cells);
                Point2::new(
                    inset + (cx as f32 + 0.5) * step,
                    inset + (cy as f32 + 0.5) * step,
                )
            })
            .collect();

        let grid = cells * THRESH_SUBDIV;
        let tstep = inner / grid as f32;
        let threshold_points = (0..grid * grid)
            .map(|i| {
                let (tx, ty) = (i % grid, i / grid);
                Point2::new(
                    inset + (tx as f32 + 0.5) * tstep,
                    inset + (ty as f32 + 0.5) * tstep,
                )
            })
            .collect();

        Some(Self {
            cells,
            side,
            points,
            threshold_points,
        })
    }

    fn frame_corners(&self) -> [Point2<f32>; 4] {
        let s = self.side;
        [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ]
    }
}

/// Decode one image quad (corners clockwise from top-left as observed).
pub fn decode_quad(
    image: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    cfg: &DecodeConfig,
    matcher: &Matcher,
) -> Option<MarkerDetection> {
    let side = mean_side(corners);
    let grid = SampleGrid::new(cfg, matcher.marker_size(), side)?;
    let h = homography_from_4pt(&grid.frame_corners(), corners)?;
    let obs = observe(image, &grid, &h, cfg, matcher.marker_size())?;
    build_detection(corners, obs, matcher)
}

/// Decode every quad, optionally keeping the best detection per id.
pub fn decode_quads(
    image: &GrayImageView<'_>,
    quads: &[[Point2<f32>; 4]],
    cfg: &DecodeConfig,
    matcher: &Matcher,
) -> Vec<MarkerDetection> {
    let out: Vec<MarkerDetection> = quads
        .iter()
        .filter_map(|q| decode_quad(image, q, cfg, matcher))
        .collect();

    if cfg.dedup_by_id {
        dedup_by_id_keep_best(out)
    } else {
        out
    }
}

fn mean_side(c: &[Point2<f32>; 4]) -> f32 {
    (0..4).map(|i| (c[(i + 1) % 4] - c[i]).norm()).sum::<f32>() / 4.0
}

fn observe(
    img: &GrayImageView<'_>,
    grid: &SampleGrid,
    h: &Homography,
    cfg: &DecodeConfig,
    bits: usize,
) -> Option<MarkerObservation> {
    let samples = grid
        .points
        .iter()
        .map(|p| sample_mean_3x3(img, h.apply(*p)))
        .collect::<Option<Vec<u8>>>()?;
    let thr_samples: Vec<u8> = grid
        .threshold_points
        .iter()
        .filter_map(|p| sample_mean_3x3(img, h.apply(*p)))
        .collect();

    decode_samples(
        &samples,
        &thr_samples,
        grid.cells,
        bits,
        cfg.border_bits,
        cfg.min_border_score,
    )
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }
    let thr = if thr_samples.is_empty() {
        otsu_threshold_from_samples(samples)
    } else {
        otsu_threshold_from_samples(thr_samples)
    };

    let mut best: Option<MarkerObservation> = None;
    for inverted in [false, true] {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code = 0u64;

        for (idx, &m) in samples.iter().enumerate() {
            let (cx, cy) = (idx % cells, idx / cells);
            let is_black = (m < thr) != inverted;
            let is_border = cx < border || cy < border || cx + border >= cells || cy + border >= cells;
            if is_border {
                border_total += 1;
                border_ok += u32::from(is_black);
            } else if is_black {
                code |= 1u64 << ((cy - border) * bits + (cx - border));
            }
        }

        let border_score = if border_total > 0 {
            border_ok as f32 / border_total as f32
        } else {
            1.0
        };
        if border_score < min_border_score {
            continue;
        }
        if best.map_or(true, |b| border_score > b.border_score) {
            best = Some(MarkerObservation {
                code,
                border_score,
                inverted,
            });
        }
    }
    best
}

fn build_detection(
    observed: &[Point2<f32>; 4],
    obs: MarkerObservation,
    matcher: &Matcher,
) -> Option<MarkerDetection> {
    let m = matcher.match_code(obs.code)?;
    let bits = matcher.bit_count().max(1) as f32;
    let score = (obs.border_score * (1.0 - m.hamming as f32 / bits)).clamp(0.0, 1.0);

    // The canonical top-left shows up `rotation` quarter turns clockwise.
    let r = m.rotation as usize;
    let corners = std::array::from_fn(|k| observed[(k + r) % 4]);

    Some(MarkerDetection {
        id: m.id,
        rotation: m.rotation,
        hamming: m.hamming,
        score,
        border_score: obs.border_score,
        code: obs.code,
        inverted: obs.inverted,
        corners,
    })
}

fn dedup_by_id_keep_best(mut dets: Vec<MarkerDetection>) -> Vec<MarkerDetection> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut seen = HashSet::new();
    dets.retain(|d| seen.insert(d.id));
    dets
}

fn sample_mean_3x3(img: &GrayImageView<'_>, p: Point2<f32>) -> Option<u8> {
    if !p.x.is_finite() || !p.y.is_finite() {
        return None;
    }
    let ix = p.x.floor() as i64;
    let iy = p.y.floor() as i64;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i64 || iy + 1 >= img.height as i64 {
        return None;
    }
    let (ix, iy) = (ix as usize, iy as usize);
    let mut sum = 0u32;
    for y in iy - 1..=iy + 1 {
        for x in ix - 1..=ix + 1 {
            sum += img.get(x, y) as u32;
        }
    }
    Some((sum / 9) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rotate_code_u64, synthetic, MarkerDictionary};
    use sheet_inspect_core::GrayImage;

    fn canvas_with_marker(code: u64, bits: usize, cell_px: usize, at: usize) -> GrayImage {
        let marker = synthetic::render_marker(code, bits, 1, cell_px);
        let mut canvas = GrayImage::new(marker.width + 2 * at, marker.height + 2 * at, 255);
        synthetic::paste(&mut canvas, &marker, at, at);
        canvas
    }

    fn square(x0: f32, side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(x0, x0),
            Point2::new(x0 + side, x0),
            Point2::new(x0 + side, x0 + side),
            Point2::new(x0, x0 + side),
        ]
    }

    #[test]
    fn decodes_marker_from_its_quad() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 10, 1);
        let matcher = Matcher::new(&dict, 0);
        let img = canvas_with_marker(dict.codes[4], 4, 10, 20);

        let det = decode_quad(&img.view(), &square(20.0, 60.0), &DecodeConfig::default(), &matcher)
            .expect("decode");
        assert_eq!(det.id, 4);
        assert_eq!(det.rotation, 0);
        assert_eq!(det.hamming, 0);
        assert!(!det.inverted);
        assert_eq!(det.corners[0], Point2::new(20.0, 20.0));
    }

    #[test]
    fn rotated_marker_reports_canonical_corner_order() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 10, 1);
        let matcher = Matcher::new(&dict, 0);
        // Printed content turned one quarter clockwise.
        let img = canvas_with_marker(rotate_code_u64(dict.codes[7], 4, 1), 4, 10, 20);

        let quad = square(20.0, 60.0);
        let det = decode_quad(&img.view(), &quad, &DecodeConfig::default(), &matcher)
            .expect("decode");
        assert_eq!(det.id, 7);
        assert_eq!(det.rotation, 1);
        // Canonical TL now sits at the observed TR.
        assert_eq!(det.corners[0], quad[1]);
        assert_eq!(det.corners[3], quad[0]);
    }

    #[test]
    fn blank_quad_fails_border_check() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 10, 1);
        let matcher = Matcher::new(&dict, 0);
        let img = GrayImage::new(100, 100, 255);
        assert!(decode_quad(&img.view(), &square(20.0, 60.0), &DecodeConfig::default(), &matcher)
            .is_none());
    }

    #[test]
    fn dedup_keeps_highest_score() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 10, 1);
        let matcher = Matcher::new(&dict, 0);
        let img = canvas_with_marker(dict.codes[2], 4, 10, 20);
        let quads = [square(20.0, 60.0), square(20.0, 60.0)];

        let cfg = DecodeConfig::default();
        assert_eq!(decode_quads(&img.view(), &quads, &cfg, &matcher).len(), 1);
        let cfg = DecodeConfig {
            dedup_by_id: false,
            ..DecodeConfig::default()
        };
        assert_eq!(decode_quads(&img.view(), &quads, &cfg, &matcher).len(), 2);
    }
}
