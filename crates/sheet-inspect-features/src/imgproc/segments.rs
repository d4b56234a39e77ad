use super::edges::EdgeMap;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::LineSegment;

// Half-width of the band erased around an accepted segment.
const CONSUME_RADIUS: isize = 3;

/// Line-segment extraction settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Minimum accumulator votes for a candidate line.
    pub vote_threshold: u32,
    /// Non-maximum suppression radius in the `(r, θ)` accumulator.
    pub suppression_radius: u32,
    /// Shortest segment reported (px).
    pub min_length_px: f32,
    /// Longest run of missing edge pixels bridged inside a segment (px).
    pub max_gap_px: usize,
    /// Candidate lines examined, best supported first.
    pub max_lines: usize,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            vote_threshold: 25,
            suppression_radius: 8,
            min_length_px: 30.0,
            max_gap_px: 5,
            max_lines: 64,
        }
    }
}

/// Clip the line `x·cosθ + y·sinθ = ρ` to the image rectangle.
fn clip_line(rho: f32, c: f32, s: f32, w: usize, h: usize) -> Option<(Point2<f32>, Point2<f32>)> {
    let (xm, ym) = ((w - 1) as f32, (h - 1) as f32);
    let mut hits: Vec<Point2<f32>> = Vec::with_capacity(4);
    if s.abs() > 1e-6 {
        for x in [0.0, xm] {
            let y = (rho - x * c) / s;
            if (0.0..=ym).contains(&y) {
                hits.push(Point2::new(x, y));
            }
        }
    }
    if c.abs() > 1e-6 {
        for y in [0.0, ym] {
            let x = (rho - y * s) / c;
            if (0.0..=xm).contains(&x) {
                hits.push(Point2::new(x, y));
            }
        }
    }
    let mut best: Option<(Point2<f32>, Point2<f32>, f32)> = None;
    for i in 0..hits.len() {
        for j in i + 1..hits.len() {
            let d = (hits[i] - hits[j]).norm_squared();
            if best.is_none_or(|(_, _, bd)| d > bd) {
                best = Some((hits[i], hits[j], d));
            }
        }
    }
    best.and_then(|(a, b, d)| (d > 1.0).then_some((a, b)))
}

/// Sample positions along `line` that sit within one pixel of an edge.
fn edge_hits(edges: &EdgeMap, line: &PolarLine, out: &mut Vec<(usize, Point2<f32>)>) {
    out.clear();
    let (s, c) = (line.angle_in_degrees as f32).to_radians().sin_cos();
    let Some((p0, p1)) = clip_line(line.r, c, s, edges.width, edges.height) else {
        return;
    };
    let d = p1 - p0;
    let steps = (d.x.abs().max(d.y.abs()).ceil() as usize).max(1);
    for i in 0..=steps {
        let p = p0 + d * (i as f32 / steps as f32);
        let on_edge = [-1.0f32, 0.0, 1.0].iter().any(|&o| {
            let q = Point2::new(p.x + o * c, p.y + o * s);
            q.x >= -0.5 && q.y >= -0.5 && edges.is_edge(q.x.round() as usize, q.y.round() as usize)
        });
        if on_edge {
            out.push((i, p));
        }
    }
}

/// Straight edge runs along the lines `imageproc` votes for.
///
/// Candidate lines are ranked by their edge support and walked over a
/// working copy of `edges`; gaps up to `max_gap_px` are bridged, and every
/// run at least `min_length_px` long is reported and erased from the copy.
pub fn line_segments(edges: &EdgeMap, params: &SegmentParams) -> Vec<LineSegment> {
    let (w, h) = (edges.width, edges.height);
    if w < 2 || h < 2 || edges.count() == 0 {
        return Vec::new();
    }
    let options = LineDetectionOptions {
        vote_threshold: params.vote_threshold,
        suppression_radius: params.suppression_radius,
    };
    let mut hits: Vec<(usize, Point2<f32>)> = Vec::new();
    let mut lines: Vec<(usize, PolarLine)> = detect_lines(&edges.to_luma(), options)
        .into_iter()
        .map(|line| {
            edge_hits(edges, &line, &mut hits);
            (hits.len(), line)
        })
        .collect();
    lines.sort_by(|a, b| b.0.cmp(&a.0));
    lines.truncate(params.max_lines);

    let mut work = edges.clone();
    let mut out = Vec::new();
    for (_, line) in &lines {
        edge_hits(&work, line, &mut hits);
        let mut run_start = 0;
        for k in 0..hits.len() {
            let closes = k + 1 == hits.len() || hits[k + 1].0 - hits[k].0 > params.max_gap_px + 1;
            if !closes {
                continue;
            }
            let seg = LineSegment {
                start: hits[run_start].1,
                end: hits[k].1,
            };
            if seg.length() >= params.min_length_px {
                consume(&mut work, &seg);
                out.push(seg);
            }
            run_start = k + 1;
        }
    }
    log::debug!("line segments: {} of {} lines kept", out.len(), lines.len());
    out
}

fn consume(work: &mut EdgeMap, seg: &LineSegment) {
    let d = seg.end - seg.start;
    let steps = (d.x.abs().max(d.y.abs()).ceil() as usize).max(1);
    for i in 0..=steps {
        let p = seg.start + d * (i as f32 / steps as f32);
        let (cx, cy) = (p.x.round() as isize, p.y.round() as isize);
        for dy in -CONSUME_RADIUS..=CONSUME_RADIUS {
            for dx in -CONSUME_RADIUS..=CONSUME_RADIUS {
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && y >= 0 {
                    work.clear_edge(x as usize, y as usize);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_stroke_with_small_gap_is_one_segment() {
        let mut e = EdgeMap::new(100, 60);
        for x in 10..80 {
            if !(40..44).contains(&x) {
                e.set_edge(x, 30);
            }
        }
        let segs = line_segments(&e, &SegmentParams::default());
        assert_eq!(segs.len(), 1, "{segs:?}");
        let s = segs[0];
        assert!((s.length() - 69.0).abs() <= 1.5, "{s:?}");
        assert!((s.start.y - 30.0).abs() <= 1.0);
    }

    #[test]
    fn large_gap_splits_and_short_pieces_drop() {
        let mut e = EdgeMap::new(120, 40);
        for x in (5..45).chain(60..80) {
            e.set_edge(x, 20);
        }
        let segs = line_segments(&e, &SegmentParams::default());
        assert_eq!(segs.len(), 1, "{segs:?}");
        assert!(segs[0].start.x.min(segs[0].end.x) <= 6.0);
        assert!(segs[0].start.x.max(segs[0].end.x) <= 45.0);
    }

    #[test]
    fn diagonal_stroke_is_found() {
        let mut e = EdgeMap::new(80, 80);
        for i in 10..70 {
            e.set_edge(i, i);
        }
        let segs = line_segments(&e, &SegmentParams::default());
        assert_eq!(segs.len(), 1, "{segs:?}");
        assert!((segs[0].length() - 59.0 * 2f32.sqrt()).abs() <= 2.0, "{segs:?}");
    }

    #[test]
    fn empty_map_has_no_segments() {
        assert!(line_segments(&EdgeMap::new(50, 50), &SegmentParams::default()).is_empty());
        assert!(line_segments(&EdgeMap::new(1, 50), &SegmentParams::default()).is_empty());
    }
}
