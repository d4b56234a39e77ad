use super::to_luma;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{match_template as correlate, MatchTemplateMethod};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::GrayImageView;

/// Best template placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    /// Top-left corner of the template in the image.
    pub x: usize,
    pub y: usize,
    /// Normalized correlation coefficient in `[-1, 1]`.
    pub score: f32,
}

/// Zero-mean normalized cross-correlation of `template` at every
/// placement inside `image`, returning the highest-scoring one.
///
/// The raw correlation map comes from `imageproc`; window sums from its
/// integral images remove the means. Flat windows (or a flat template)
/// score 0. `None` when the template does not fit inside the image.
pub fn match_template(
    image: &GrayImageView<'_>,
    template: &GrayImageView<'_>,
) -> Option<TemplateMatch> {
    let (w, h) = (image.width, image.height);
    let (tw, th) = (template.width, template.height);
    if tw == 0 || th == 0 || tw > w || th > h {
        return None;
    }
    let n = (tw * th) as f64;
    let t_sum: f64 = template.data.iter().map(|&v| v as f64).sum();
    let t_mean = t_sum / n;
    let t_norm2: f64 = template
        .data
        .iter()
        .map(|&v| (v as f64 - t_mean).powi(2))
        .sum();

    let img = to_luma(image);
    let raw = correlate(&img, &to_luma(template), MatchTemplateMethod::CrossCorrelation);
    let sum = integral_image::<_, u64>(&img);
    let sum2 = integral_squared_image::<_, u64>(&img);
    let (tw32, th32) = (tw as u32 - 1, th as u32 - 1);

    let mut best = TemplateMatch {
        x: 0,
        y: 0,
        score: f32::NEG_INFINITY,
    };
    for (x, y, cc) in raw.enumerate_pixels() {
        let s = sum_image_pixels(&sum, x, y, x + tw32, y + th32)[0] as f64;
        let s2 = sum_image_pixels(&sum2, x, y, x + tw32, y + th32)[0] as f64;
        let var = (s2 - s * s / n).max(0.0);
        let denom = (var * t_norm2).sqrt();
        let score = if denom <= 1e-9 {
            0.0
        } else {
            ((cc[0] as f64 - t_mean * s) / denom).clamp(-1.0, 1.0) as f32
        };
        if score > best.score {
            best = TemplateMatch {
                x: x as usize,
                y: y as usize,
                score,
            };
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_inspect_core::GrayImage;

    fn pattern(w: usize, h: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                img.set(x, y, ((x * 37 + y * 91 + x * y * 13) % 251) as u8);
            }
        }
        img
    }

    #[test]
    fn locates_an_embedded_patch() {
        let img = pattern(48, 40);
        let mut patch = GrayImage::new(10, 8, 0);
        for y in 0..8 {
            for x in 0..10 {
                patch.set(x, y, img.view().get(x + 21, y + 13));
            }
        }
        let m = match_template(&img.view(), &patch.view()).expect("fits");
        assert_eq!((m.x, m.y), (21, 13));
        assert!((m.score - 1.0).abs() < 1e-3, "{m:?}");
    }

    #[test]
    fn brightness_offset_does_not_change_the_score() {
        let img = pattern(20, 20);
        let brighter: Vec<u8> = img.data.iter().map(|&v| (v / 2) + 100).collect();
        let tmpl: Vec<u8> = img.data.iter().map(|&v| v / 2).collect();
        let a = GrayImageView::from_slice(20, 20, &brighter).expect("view");
        let t = GrayImageView::from_slice(20, 20, &tmpl).expect("view");
        let m = match_template(&a, &t).expect("fits");
        assert!(m.score > 0.999, "{m:?}");
    }

    #[test]
    fn oversized_or_flat_templates() {
        let img = GrayImage::new(8, 8, 7);
        let big = GrayImage::new(9, 3, 0);
        assert!(match_template(&img.view(), &big.view()).is_none());
        let flat = GrayImage::new(3, 3, 50);
        let m = match_template(&img.view(), &flat.view()).expect("fits");
        assert_eq!(m.score, 0.0);
    }
}
