use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::RgbImageView;

/// 8-bit HSV with H in `0..=180`, S and V in `0..=255`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    [
        (h * 0.5).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        v.round() as u8,
    ]
}

/// Inclusive per-channel HSV bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl HsvRange {
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.low[c] <= hsv[c] && hsv[c] <= self.high[c])
    }
}

/// Mean RGB over pixels whose centers lie within `radius` of `center`.
///
/// `None` when the disk covers no pixel of the image.
pub fn mean_rgb_in_circle(
    img: &RgbImageView<'_>,
    center: Point2<f32>,
    radius: f32,
) -> Option<[f32; 3]> {
    if img.width == 0 || img.height == 0 || radius.is_nan() || radius < 0.0 {
        return None;
    }
    let r2 = radius * radius;
    let x0 = (center.x - radius).floor().max(0.0) as usize;
    let y0 = (center.y - radius).floor().max(0.0) as usize;
    let x1 = ((center.x + radius).ceil().max(0.0) as usize).min(img.width - 1);
    let y1 = ((center.y + radius).ceil().max(0.0) as usize).min(img.height - 1);

    let mut sum = [0f64; 3];
    let mut n = 0usize;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f32 - center.x, y as f32 - center.y);
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let px = img.pixel(x, y);
            for c in 0..3 {
                sum[c] += px[c] as f64;
            }
            n += 1;
        }
    }
    (n > 0).then(|| sum.map(|s| (s / n as f64) as f32))
}
