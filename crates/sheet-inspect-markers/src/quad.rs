//! Candidate marker quadrilaterals from dark connected components.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::GrayImageView;

/// Quad candidate filtering.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Smallest component (in pixels) considered a marker.
    pub min_area_px: usize,
    /// Largest component as a fraction of the frame area.
    pub max_area_frac: f32,
    /// Shortest accepted quad side in pixels.
    pub min_side_px: f32,
    /// Minimum `shortest / longest` side ratio.
    pub min_side_ratio: f32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_area_px: 64,
            max_area_frac: 0.5,
            min_side_px: 8.0,
            min_side_ratio: 0.3,
        }
    }
}

/// One quadrilateral candidate, corners clockwise from the top-left.
#[derive(Clone, Debug)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
    pub area_px: usize,
}

/// Label 4-connected components of `mask` (non-zero = foreground).
///
/// Returns one pixel list per component.
pub(crate) fn connected_components(mask: &[u8], width: usize, height: usize) -> Vec<Vec<(u32, u32)>> {
    let mut visited = vec![false; mask.len()];
    let mut components = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut pixels = Vec::new();

        while let Some(idx) = stack.pop() {
            let x = idx % width;
            let y = idx / width;
            pixels.push((x as u32, y as u32));

            let mut visit = |n: usize| {
                if mask[n] != 0 && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }
        components.push(pixels);
    }

    components
}

/// Find convex quadrilateral candidates among dark components of `img`.
pub fn find_quads(img: &GrayImageView<'_>, threshold: u8, params: &QuadParams) -> Vec<Quad> {
    let mask = crate::threshold::dark_mask(img, threshold);
    let max_area = (params.max_area_frac.clamp(0.0, 1.0) * (img.width * img.height) as f32) as usize;

    let mut quads = Vec::new();
    for pixels in connected_components(&mask, img.width, img.height) {
        let area = pixels.len();
        if area < params.min_area_px || area > max_area {
            continue;
        }
        if touches_border(&pixels, img.width, img.height) {
            continue;
        }
        let Some(corners) = quad_corners(&pixels) else {
            continue;
        };
        if !quad_is_well_formed(&corners, params) {
            continue;
        }
        quads.push(Quad {
            corners,
            area_px: area,
        });
    }

    log::debug!("find_quads: {} candidates (threshold {threshold})", quads.len());
    quads
}

fn touches_border(pixels: &[(u32, u32)], width: usize, height: usize) -> bool {
    pixels.iter().any(|&(x, y)| {
        x == 0 || y == 0 || x as usize + 1 == width || y as usize + 1 == height
    })
}

/// Extreme points of a blob: the farthest pixel from the centroid, the
/// farthest pixel from that one, then the extremes on each side of the
/// diagonal they span.
fn quad_corners(pixels: &[(u32, u32)]) -> Option<[Point2<f32>; 4]> {
    let n = pixels.len() as f32;
    let (sx, sy) = pixels
        .iter()
        .fold((0f64, 0f64), |(ax, ay), &(x, y)| (ax + x as f64, ay + y as f64));
    let c = Point2::new((sx / n as f64) as f32 + 0.5, (sy / n as f64) as f32 + 0.5);

    let pts: Vec<Point2<f32>> = pixels
        .iter()
        .map(|&(x, y)| Point2::new(x as f32 + 0.5, y as f32 + 0.5))
        .collect();

    let farthest_from = |o: Point2<f32>| -> Option<Point2<f32>> {
        pts.iter()
            .copied()
            .max_by(|a, b| (*a - o).norm_squared().total_cmp(&(*b - o).norm_squared()))
    };

    let p0 = farthest_from(c)?;
    let p2 = farthest_from(p0)?;
    let d = p2 - p0;
    if d.norm() < 1.0 {
        return None;
    }

    let signed = |p: &Point2<f32>| d.x * (p.y - p0.y) - d.y * (p.x - p0.x);
    let p1 = pts.iter().copied().max_by(|a, b| signed(a).total_cmp(&signed(b)))?;
    let p3 = pts.iter().copied().min_by(|a, b| signed(a).total_cmp(&signed(b)))?;
    if signed(&p1) <= 0.0 || signed(&p3) >= 0.0 {
        return None;
    }

    // Pixel centers -> pixel edges.
    let mut corners = [p0, p1, p2, p3].map(|p| {
        Point2::new(
            p.x + 0.5 * (p.x - c.x).signum(),
            p.y + 0.5 * (p.y - c.y).signum(),
        )
    });
    order_clockwise_from_top_left(&mut corners, c);
    Some(corners)
}

/// Sort by angle around `center` (clockwise in y-down image coordinates),
/// then rotate so the corner with the smallest `x + y` comes first.
fn order_clockwise_from_top_left(corners: &mut [Point2<f32>; 4], center: Point2<f32>) {
    corners.sort_by(|a, b| {
        let ta = (a.y - center.y).atan2(a.x - center.x);
        let tb = (b.y - center.y).atan2(b.x - center.x);
        ta.total_cmp(&tb)
    });
    let start = corners
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    corners.rotate_left(start);
}

fn quad_is_well_formed(corners: &[Point2<f32>; 4], params: &QuadParams) -> bool {
    let sides: Vec<f32> = (0..4)
        .map(|i| (corners[(i + 1) % 4] - corners[i]).norm())
        .collect();
    let min = sides.iter().copied().fold(f32::INFINITY, f32::min);
    let max = sides.iter().copied().fold(0.0, f32::max);
    if !min.is_finite() || min < params.min_side_px || max <= 0.0 {
        return false;
    }
    if min / max < params.min_side_ratio {
        return false;
    }

    // Convex: all cross products of consecutive edges share a sign.
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = corners[(i + 1) % 4] - corners[i];
        let b = corners[(i + 2) % 4] - corners[(i + 1) % 4];
        let cross = a.x * b.y - a.y * b.x;
        if cross.abs() < f32::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_inspect_core::GrayImage;

    fn fill_rect(img: &mut GrayImage, x0: usize, y0: usize, w: usize, h: usize, v: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.set(x, y, v);
            }
        }
    }

    #[test]
    fn axis_aligned_square_corners_land_on_pixel_edges() {
        let mut img = GrayImage::new(100, 100, 255);
        fill_rect(&mut img, 20, 30, 40, 40, 0);

        let quads = find_quads(&img.view(), 128, &QuadParams::default());
        assert_eq!(quads.len(), 1);
        let c = quads[0].corners;
        let expected = [(20.0, 30.0), (60.0, 30.0), (60.0, 70.0), (20.0, 70.0)];
        for (p, (ex, ey)) in c.iter().zip(expected) {
            assert!((p.x - ex).abs() < 1e-3 && (p.y - ey).abs() < 1e-3, "{p:?}");
        }
    }

    #[test]
    fn thin_and_tiny_blobs_are_rejected() {
        let mut img = GrayImage::new(120, 120, 255);
        fill_rect(&mut img, 10, 10, 60, 4, 0); // sliver
        fill_rect(&mut img, 90, 90, 5, 5, 0); // below min area
        assert!(find_quads(&img.view(), 128, &QuadParams::default()).is_empty());
    }

    #[test]
    fn blobs_touching_the_frame_are_skipped() {
        let mut img = GrayImage::new(80, 80, 255);
        fill_rect(&mut img, 0, 10, 30, 30, 0);
        assert!(find_quads(&img.view(), 128, &QuadParams::default()).is_empty());
    }

    #[test]
    fn diagonal_neighbours_are_separate_components() {
        let mask = vec![1, 0, 0, 1];
        let comps = connected_components(&mask, 2, 2);
        assert_eq!(comps.len(), 2);
    }
}
