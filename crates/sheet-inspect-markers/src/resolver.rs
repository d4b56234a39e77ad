//! Frame-level marker detection: threshold, quads, decode.

use crate::decode::{decode_quads, DecodeConfig};
use crate::quad::{find_quads, QuadParams};
use crate::threshold::otsu_threshold;
use crate::{Dictionary, MarkerDictionary, Matcher};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::GrayImageView;
use std::path::PathBuf;
use std::sync::OnceLock;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A detected fiducial: id plus corners in marker orientation (TL, TR, BR, BL).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialMarker {
    pub id: u32,
    pub corners: [Point2<f32>; 4],
}

impl FiducialMarker {
    pub fn center(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Mean side length in pixels.
    pub fn side_px(&self) -> f32 {
        let c = &self.corners;
        (0..4).map(|i| (c[(i + 1) % 4] - c[i]).norm()).sum::<f32>() / 4.0
    }
}

/// Resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectParams {
    pub dictionary: MarkerDictionary,
    /// Directory holding `<NAME>_CODES.json` tables; the built-in table
    /// is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_dir: Option<PathBuf>,
    /// Global binarization threshold; Otsu when absent.
    pub threshold: Option<u8>,
    pub quad: QuadParams,
    pub decode: DecodeConfig,
}

impl Default for MarkerDetectParams {
    fn default() -> Self {
        Self {
            dictionary: MarkerDictionary::default(),
            dictionary_dir: None,
            threshold: None,
            quad: QuadParams::default(),
            decode: DecodeConfig::default(),
        }
    }
}

/// Marker detector for one configured dictionary.
///
/// The rotated-code matcher is built on first use and reused afterwards.
#[derive(Debug)]
pub struct MarkerResolver {
    params: MarkerDetectParams,
    dictionary: Option<Dictionary>,
    matcher: OnceLock<Option<Matcher>>,
}

impl MarkerResolver {
    /// Resolver loading its code table on first use, from
    /// `params.dictionary_dir` when set and the built-in table otherwise.
    pub fn new(params: MarkerDetectParams) -> Self {
        Self {
            params,
            dictionary: None,
            matcher: OnceLock::new(),
        }
    }

    /// Resolver over an explicit, already loaded code table.
    pub fn with_dictionary(params: MarkerDetectParams, dictionary: Dictionary) -> Self {
        Self {
            params,
            dictionary: Some(dictionary),
            matcher: OnceLock::new(),
        }
    }

    pub fn params(&self) -> &MarkerDetectParams {
        &self.params
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.matcher
            .get_or_init(|| {
                let max_hamming = self.params.decode.max_hamming;
                if let Some(dict) = &self.dictionary {
                    return Some(Matcher::new(dict, max_hamming));
                }
                let kind = self.params.dictionary;
                let (loaded, source) = match &self.params.dictionary_dir {
                    Some(dir) => (kind.load_from_dir(dir), dir.display().to_string()),
                    None => (kind.builtin(), "built-in tables".to_string()),
                };
                match loaded {
                    Ok(dict) => {
                        log::debug!("marker dictionary {} from {source}", kind.name());
                        Some(Matcher::new(&dict, max_hamming))
                    }
                    Err(err) => {
                        log::warn!("marker dictionary {} unavailable in {source}: {err}", kind.name());
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Detect all markers in a gray frame. Any failure yields an empty list.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect_markers(&self, image: &GrayImageView<'_>) -> Vec<FiducialMarker> {
        let Some(matcher) = self.matcher() else {
            return Vec::new();
        };
        let threshold = self.params.threshold.unwrap_or_else(|| otsu_threshold(image));
        let quads: Vec<[Point2<f32>; 4]> = find_quads(image, threshold, &self.params.quad)
            .into_iter()
            .map(|q| q.corners)
            .collect();

        let mut markers: Vec<FiducialMarker> = decode_quads(image, &quads, &self.params.decode, matcher)
            .into_iter()
            .map(|d| FiducialMarker {
                id: d.id,
                corners: d.corners,
            })
            .collect();
        markers.sort_by_key(|m| m.id);

        log::debug!(
            "detect_markers: {} quads, {} markers (threshold {threshold})",
            quads.len(),
            markers.len()
        );
        markers
    }
}

/// Axis-aligned square tag of side `size_px` centered on a feature.
pub fn virtual_tag_for_feature(center: Point2<f32>, id: u32, size_px: f32) -> FiducialMarker {
    let h = 0.5 * size_px;
    FiducialMarker {
        id,
        corners: [
            Point2::new(center.x - h, center.y - h),
            Point2::new(center.x + h, center.y - h),
            Point2::new(center.x + h, center.y + h),
            Point2::new(center.x - h, center.y + h),
        ],
    }
}

/// Default virtual tag side in pixels.
pub const VIRTUAL_TAG_SIZE_PX: f32 = 20.0;
