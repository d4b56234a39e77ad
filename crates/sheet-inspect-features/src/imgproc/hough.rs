use super::edges::canny;
use super::filter::sobel;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::GrayImageView;

/// Gradient Hough circle transform settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughCircleParams {
    /// Inverse accumulator resolution (1 = image resolution).
    pub dp: f32,
    /// Minimum distance between accepted centers (px).
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Votes a center (and its radius) needs to be accepted.
    pub acc_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughCircleParams {
    fn default() -> Self {
        Self {
            dp: 1.0,
            min_dist: 20.0,
            canny_high: 100.0,
            acc_threshold: 30,
            min_radius: 10,
            max_radius: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoughCircle {
    pub center: Point2<f32>,
    pub radius: f32,
    /// Center accumulator votes.
    pub votes: u32,
}

/// Circles whose edges agree with the gradient direction.
///
/// Every Canny edge pixel votes for centers along its gradient line at
/// all radii in range. Local accumulator maxima above the threshold are
/// visited strongest first; each gets the radius best supported by the
/// edge pixels around it. Output is sorted by votes, strongest first.
pub fn hough_circles(src: &GrayImageView<'_>, params: &HoughCircleParams) -> Vec<HoughCircle> {
    let (w, h) = (src.width, src.height);
    if w < 3 || h < 3 {
        return Vec::new();
    }
    let dp = params.dp.max(1.0);
    let min_r = params.min_radius.max(1);
    let max_r = if params.max_radius == 0 {
        w.max(h) as u32
    } else {
        params.max_radius.max(min_r)
    };

    // Edge locations come from Canny; vote directions from the raw Sobel.
    let grad = sobel(src);
    let edges = canny(src, 0.5 * params.canny_high, params.canny_high);

    let aw = (w as f32 / dp).ceil() as usize;
    let ah = (h as f32 / dp).ceil() as usize;
    let mut acc = vec![0u32; aw * ah];
    let mut points: Vec<Point2<f32>> = Vec::new();

    for (x, y) in edges.points() {
        let i = y * w + x;
        let (gx, gy) = (grad.gx[i] as f32, grad.gy[i] as f32);
        let mag = (gx * gx + gy * gy).sqrt();
        if mag <= f32::EPSILON {
            continue;
        }
        points.push(Point2::new(x as f32, y as f32));
        let (ux, uy) = (gx / mag, gy / mag);
        for sign in [1.0f32, -1.0] {
            for r in min_r..=max_r {
                let cx = (x as f32 + sign * r as f32 * ux) / dp;
                let cy = (y as f32 + sign * r as f32 * uy) / dp;
                let (ax, ay) = (cx.round(), cy.round());
                if ax < 0.0 || ay < 0.0 || ax >= aw as f32 || ay >= ah as f32 {
                    break;
                }
                acc[ay as usize * aw + ax as usize] += 1;
            }
        }
    }
    if points.is_empty() {
        return Vec::new();
    }

    let mut centers = Vec::new();
    for y in 1..ah.saturating_sub(1) {
        for x in 1..aw.saturating_sub(1) {
            let i = y * aw + x;
            let v = acc[i];
            if v > params.acc_threshold
                && v > acc[i - 1]
                && v >= acc[i + 1]
                && v > acc[i - aw]
                && v >= acc[i + aw]
            {
                centers.push((i, v));
            }
        }
    }
    centers.sort_by(|a, b| b.1.cmp(&a.1));
    log::debug!(
        "hough: {} edge points, {} center candidates",
        points.len(),
        centers.len()
    );

    let min_dist2 = params.min_dist.max(0.0).powi(2);
    let mut out: Vec<HoughCircle> = Vec::new();
    let mut dists: Vec<f32> = Vec::with_capacity(points.len());
    for (i, votes) in centers {
        let center = Point2::new((i % aw) as f32 * dp, (i / aw) as f32 * dp);
        if out
            .iter()
            .any(|c| (c.center - center).norm_squared() < min_dist2)
        {
            continue;
        }
        dists.clear();
        dists.extend(
            points
                .iter()
                .map(|p| (p - center).norm())
                .filter(|&d| d >= min_r as f32 - 0.5 && d <= max_r as f32 + 0.5),
        );
        let Some(radius) = best_radius(&dists, min_r, max_r, params.acc_threshold) else {
            continue;
        };
        out.push(HoughCircle {
            center,
            radius,
            votes,
        });
    }
    out
}

/// Radius with the highest edge support per unit of circumference.
///
/// Distances are binned at 1 px; a 2-bin window absorbs the edge spread.
/// The chosen radius is the mean distance within the window.
fn best_radius(dists: &[f32], min_r: u32, max_r: u32, min_support: u32) -> Option<f32> {
    let n_bins = (max_r - min_r + 2) as usize;
    let mut hist = vec![0u32; n_bins];
    let mut sums = vec![0f32; n_bins];
    for &d in dists {
        let b = ((d - min_r as f32 + 0.5).floor().max(0.0) as usize).min(n_bins - 1);
        hist[b] += 1;
        sums[b] += d;
    }
    let mut best: Option<(usize, u32, f32)> = None;
    for b in 0..n_bins - 1 {
        let count = hist[b] + hist[b + 1];
        if count == 0 {
            continue;
        }
        let r = min_r as f32 + b as f32 + 0.5;
        let ratio = count as f32 / r;
        if best.is_none_or(|(_, _, best_ratio)| ratio > best_ratio) {
            best = Some((b, count, ratio));
        }
    }
    let (b, count, _) = best?;
    (count > min_support).then(|| (sums[b] + sums[b + 1]) / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imgproc::gaussian_blur;
    use sheet_inspect_core::GrayImage;

    fn disks(w: usize, h: usize, disks: &[(f32, f32, f32)]) -> GrayImage {
        let mut img = GrayImage::new(w, h, 210);
        for y in 0..h {
            for x in 0..w {
                for &(cx, cy, r) in disks {
                    let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                    if dx * dx + dy * dy <= r * r {
                        img.set(x, y, 30);
                    }
                }
            }
        }
        img
    }

    #[test]
    fn finds_two_dark_disks() {
        let img = disks(200, 160, &[(50.0, 60.0, 20.0), (140.0, 90.0, 28.0)]);
        let blurred = gaussian_blur(&img.view(), 9, 2.0);
        let params = HoughCircleParams {
            min_dist: 160.0 / 8.0,
            ..HoughCircleParams::default()
        };
        let mut found = hough_circles(&blurred.view(), &params);
        assert_eq!(found.len(), 2, "{found:?}");
        found.sort_by(|a, b| a.center.x.total_cmp(&b.center.x));
        assert!((found[0].center - Point2::new(50.0, 60.0)).norm() <= 1.5, "{found:?}");
        assert!((found[0].radius - 20.0).abs() <= 1.5, "{found:?}");
        assert!((found[1].center - Point2::new(140.0, 90.0)).norm() <= 1.5, "{found:?}");
        assert!((found[1].radius - 28.0).abs() <= 1.5, "{found:?}");
    }

    #[test]
    fn flat_image_has_no_circles() {
        let img = GrayImage::new(64, 64, 128);
        assert!(hough_circles(&img.view(), &HoughCircleParams::default()).is_empty());
    }

    #[test]
    fn best_radius_prefers_the_dense_ring() {
        let mut d = vec![15.2; 80];
        d.extend(std::iter::repeat_n(40.0, 30));
        let r = best_radius(&d, 10, 50, 30).expect("radius");
        assert!((r - 15.2).abs() < 1e-2, "{r}");
        assert!(best_radius(&d[..20], 10, 50, 30).is_none());
    }
}
