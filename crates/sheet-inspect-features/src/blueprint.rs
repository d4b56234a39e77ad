//! Blueprint identification by template matching.

use crate::imgproc::match_template;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Scores at or below this are not a match.
pub const MATCH_THRESHOLD: f32 = 0.7;

/// Which face of the sheet faces the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    Front,
    Back,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMatch {
    pub id: String,
    pub score: f32,
    /// Top-left of the best template placement (px).
    pub location: [usize; 2],
    pub orientation: Orientation,
}

/// Reference images keyed by blueprint id.
#[derive(Clone, Debug, Default)]
pub struct BlueprintMatcher {
    templates: Vec<(String, GrayImage)>,
}

impl BlueprintMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&mut self, id: impl Into<String>, template: GrayImage) {
        self.templates.push((id.into(), template));
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Best-scoring template above [`MATCH_THRESHOLD`]; the first one wins ties.
    ///
    /// The orientation is `Back` when the template rotated by 180° scores
    /// at least as well as the template itself.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn match_blueprint(&self, image: &GrayImageView<'_>) -> Option<BlueprintMatch> {
        let mut best: Option<(usize, f32, [usize; 2])> = None;
        for (i, (id, template)) in self.templates.iter().enumerate() {
            let Some(m) = match_template(image, &template.view()) else {
                log::debug!("blueprint {id}: template larger than frame");
                continue;
            };
            log::debug!("blueprint {id}: score {:.3}", m.score);
            if m.score > MATCH_THRESHOLD && best.is_none_or(|(_, s, _)| m.score > s) {
                best = Some((i, m.score, [m.x, m.y]));
            }
        }
        let (i, score, location) = best?;
        let (id, template) = &self.templates[i];
        let flipped = rotate_180(template);
        let flipped_score = match_template(image, &flipped.view()).map_or(f32::MIN, |m| m.score);
        let orientation = if score > flipped_score {
            Orientation::Front
        } else {
            Orientation::Back
        };
        Some(BlueprintMatch {
            id: id.clone(),
            score,
            location,
            orientation,
        })
    }
}

/// Flip around both axes.
pub fn rotate_180(img: &GrayImage) -> GrayImage {
    let mut data = img.data.clone();
    data.reverse();
    GrayImage {
        width: img.width,
        height: img.height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(w: usize, h: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                let v = (x * 7 + y * y * 3 + (x * y) % 11) % 256;
                img.set(x, y, v as u8);
            }
        }
        img
    }

    // Symmetric under a half turn apart from a small corner mark.
    fn nearly_symmetric(w: usize, h: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                let dx = 2 * x as i64 - (w as i64 - 1);
                let dy = 2 * y as i64 - (h as i64 - 1);
                img.set(x, y, (((dx * dx + dy * dy) * 3 / 4) % 200) as u8);
            }
        }
        for y in 0..2 {
            for x in 0..2 {
                img.set(x, y, 255);
            }
        }
        img
    }

    fn paste(dst: &mut GrayImage, src: &GrayImage, ox: usize, oy: usize) {
        for y in 0..src.height {
            for x in 0..src.width {
                dst.set(ox + x, oy + y, src.data[y * src.width + x]);
            }
        }
    }

    #[test]
    fn identifies_template_and_face() {
        let a = pattern(24, 16);
        let b = GrayImage::new(24, 16, 90);
        let mut frame = GrayImage::new(80, 60, 128);
        paste(&mut frame, &a, 30, 20);

        let mut matcher = BlueprintMatcher::new();
        matcher.add_template("flat", b);
        matcher.add_template("part-a", a);
        let m = matcher.match_blueprint(&frame.view()).expect("match");
        assert_eq!(m.id, "part-a");
        assert_eq!(m.location, [30, 20]);
        assert_eq!(m.orientation, Orientation::Front);

    }

    #[test]
    fn half_turned_part_is_the_back_face() {
        let t = nearly_symmetric(24, 16);
        let mut matcher = BlueprintMatcher::new();
        matcher.add_template("part-b", t.clone());

        let mut front = GrayImage::new(80, 60, 128);
        paste(&mut front, &t, 10, 5);
        let m = matcher.match_blueprint(&front.view()).expect("front");
        assert_eq!(m.orientation, Orientation::Front);

        let mut back = GrayImage::new(80, 60, 128);
        paste(&mut back, &rotate_180(&t), 10, 5);
        let m = matcher.match_blueprint(&back.view()).expect("back");
        assert!(m.score > MATCH_THRESHOLD && m.score < 1.0, "{m:?}");
        assert_eq!(m.orientation, Orientation::Back);
    }

    #[test]
    fn weak_scores_do_not_match() {
        let mut matcher = BlueprintMatcher::new();
        matcher.add_template("part-a", pattern(24, 16));
        let frame = GrayImage::new(80, 60, 128);
        assert!(matcher.match_blueprint(&frame.view()).is_none());
        assert!(BlueprintMatcher::new().match_blueprint(&frame.view()).is_none());
    }
}
