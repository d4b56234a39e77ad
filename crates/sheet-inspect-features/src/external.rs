//! Normalization of labelled boxes produced by an external object detector.

use crate::feature::{DetectionItem, FeatureType, PixelGeometry};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::Rect;

/// Raw collaborator output: `{type, pixelGeometry, confidence}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCandidate {
    #[serde(rename = "type")]
    pub label: String,
    pub pixel_geometry: PixelGeometry,
    pub confidence: f32,
}

impl ExternalCandidate {
    pub fn boxed(label: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            label: label.into(),
            pixel_geometry: PixelGeometry::Box(bbox),
            confidence,
        }
    }

    pub fn bbox(&self) -> Rect {
        self.pixel_geometry.bounding()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateFilter {
    /// Candidates below this confidence are dropped.
    pub confidence_threshold: f32,
    /// Same-class boxes overlapping a stronger one above this IoU are dropped.
    pub nms_iou: f32,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_iou: 0.4,
        }
    }
}

impl CandidateFilter {
    /// Map labels, drop weak and unknown candidates, then suppress
    /// overlaps per class. Output is sorted by confidence, strongest first.
    pub fn normalize(&self, candidates: &[ExternalCandidate]) -> Vec<DetectionItem> {
        let mut items: Vec<DetectionItem> = Vec::with_capacity(candidates.len());
        let mut unknown = 0usize;
        for c in candidates {
            if c.confidence.is_nan() || c.confidence < self.confidence_threshold {
                continue;
            }
            let Some(ty) = FeatureType::from_label(&c.label) else {
                unknown += 1;
                continue;
            };
            items.push(DetectionItem::new(ty, c.pixel_geometry.clone(), c.confidence));
        }
        if unknown > 0 {
            log::debug!("external candidates: {unknown} with unknown labels dropped");
        }
        items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<DetectionItem> = Vec::with_capacity(items.len());
        for item in items {
            let bbox = item.pixel_geometry.bounding();
            let suppressed = kept.iter().any(|k| {
                k.feature_type == item.feature_type
                    && k.pixel_geometry.bounding().iou(&bbox) > self.nms_iou
            });
            if !suppressed {
                kept.push(item);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_labels_thresholds_and_suppresses_per_class() {
        let cands = vec![
            ExternalCandidate::boxed("agujero", Rect::new(10.0, 10.0, 20.0, 20.0), 0.9),
            ExternalCandidate::boxed("HOLE", Rect::new(12.0, 12.0, 20.0, 20.0), 0.8),
            ExternalCandidate::boxed("Avellanado", Rect::new(12.0, 12.0, 20.0, 20.0), 0.7),
            ExternalCandidate::boxed("hole", Rect::new(100.0, 10.0, 20.0, 20.0), 0.45),
            ExternalCandidate::boxed("rivet", Rect::new(200.0, 10.0, 20.0, 20.0), 0.99),
        ];
        let items = CandidateFilter::default().normalize(&cands);
        assert_eq!(items.len(), 2, "{items:?}");
        assert_eq!(items[0].feature_type, FeatureType::Hole);
        assert_eq!(items[0].confidence, 0.9);
        assert_eq!(items[1].feature_type, FeatureType::Countersink);
    }

    #[test]
    fn parses_collaborator_json() {
        let json = r#"[{"type":"rayadura","pixelGeometry":{"kind":"line","start":[0,0],"end":[30,40]},"confidence":0.6}]"#;
        let cands: Vec<ExternalCandidate> = serde_json::from_str(json).expect("json");
        let items = CandidateFilter::default().normalize(&cands);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].feature_type, FeatureType::Scratch);
        assert_eq!(cands[0].bbox(), Rect::new(0.0, 0.0, 30.0, 40.0));
    }
}
