use super::to_luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use nalgebra::Point2;
use sheet_inspect_core::{GrayImageView, Rect};

/// Ordered boundary vertices in pixel coordinates.
pub type Contour = Vec<Point2<f32>>;

fn to_points(contour: &[Point2<f32>]) -> Vec<Point<f32>> {
    contour.iter().map(|p| Point::new(p.x, p.y)).collect()
}

fn from_points(points: &[Point<f32>]) -> Contour {
    points.iter().map(|p| Point2::new(p.x, p.y)).collect()
}

/// Outer boundaries of the top-level non-zero regions of `mask`.
///
/// Regions nested inside a hole of another region are skipped.
pub fn find_external_contours(mask: &GrayImageView<'_>) -> Vec<Contour> {
    if mask.width == 0 || mask.height == 0 {
        return Vec::new();
    }
    find_contours::<i32>(&to_luma(mask))
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            c.points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect()
        })
        .collect()
}

/// Perimeter (closed) or polyline length.
pub fn arc_length(contour: &[Point2<f32>], closed: bool) -> f32 {
    if contour.len() < 2 {
        return 0.0;
    }
    imageproc::geometry::arc_length(&to_points(contour), closed) as f32
}

/// Unsigned shoelace area of the closed polygon.
pub fn contour_area(contour: &[Point2<f32>]) -> f32 {
    let n = contour.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0f64;
    for i in 0..n {
        let (a, b) = (contour[i], contour[(i + 1) % n]);
        twice += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (twice.abs() * 0.5) as f32
}

/// Integer pixel extent of the contour (inclusive of both end pixels).
pub fn bounding_rect(contour: &[Point2<f32>]) -> Option<Rect> {
    Rect::bounding(contour).map(|r| Rect::new(r.x, r.y, r.width + 1.0, r.height + 1.0))
}

fn simplify_open(points: &[Point<f32>], epsilon: f32) -> Vec<Point<f32>> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    approximate_polygon_dp(points, epsilon.max(f32::EPSILON) as f64, false)
}

/// Douglas–Peucker simplification with tolerance `epsilon` (px).
///
/// Closed curves are split at the vertex farthest from the first one;
/// each half is simplified as an open polyline and the two are joined
/// without repeating the shared vertices.
pub fn approx_poly_dp(contour: &[Point2<f32>], epsilon: f32, closed: bool) -> Contour {
    let n = contour.len();
    if n <= 2 {
        return contour.to_vec();
    }
    let points = to_points(contour);
    if !closed {
        return from_points(&simplify_open(&points, epsilon));
    }
    let first = contour[0];
    let (split, _) = contour
        .iter()
        .enumerate()
        .map(|(i, p)| (i, (p - first).norm_squared()))
        .fold((0, -1f32), |best, cur| if cur.1 > best.1 { cur } else { best });
    if split == 0 {
        return vec![first];
    }

    let head = simplify_open(&points[..=split], epsilon);
    let mut tail_pts = points[split..].to_vec();
    tail_pts.push(points[0]);
    let tail = simplify_open(&tail_pts, epsilon);

    let mut out = from_points(&head);
    // The tail starts on the split vertex and ends on `first`.
    if tail.len() > 2 {
        out.extend(from_points(&tail[1..tail.len() - 1]));
    }
    out
}
