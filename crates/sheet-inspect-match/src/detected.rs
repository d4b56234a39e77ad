use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::{DetectionItem, FeatureType};

/// A detection already converted to mm, relative to the same origin as
/// the specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFeature {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub position_mm: Point2<f64>,
    #[serde(default)]
    pub diameter_mm: f64,
    #[serde(default)]
    pub has_alodine: bool,
    /// Index of the source [`DetectionItem`], when built from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
}

impl DetectedFeature {
    pub fn new(feature_type: FeatureType, x_mm: f64, y_mm: f64, diameter_mm: f64) -> Self {
        Self {
            feature_type,
            position_mm: Point2::new(x_mm, y_mm),
            diameter_mm,
            has_alodine: false,
            source: None,
        }
    }

    pub fn with_alodine(mut self, has_alodine: bool) -> Self {
        self.has_alodine = has_alodine;
        self
    }

    /// `None` for items that were never measured.
    pub fn from_item(item: &DetectionItem) -> Option<Self> {
        let m = item.measurement?;
        Some(Self {
            feature_type: item.feature_type,
            position_mm: m.position_mm,
            diameter_mm: m.diameter_mm.unwrap_or(0.0),
            has_alodine: item.has_alodine,
            source: None,
        })
    }

    /// Measured items, tagged with their index in `items`.
    pub fn from_items(items: &[DetectionItem]) -> Vec<Self> {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                Self::from_item(item).map(|mut d| {
                    d.source = Some(i);
                    d
                })
            })
            .collect()
    }
}
