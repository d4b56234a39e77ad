//! Everything an inspection run can be tuned with, in one JSON document.

use crate::error::InspectError;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::{CandidateFilter, FeatureDetectorParams};
use sheet_inspect_markers::MarkerDetectParams;
use sheet_inspect_match::{Face, MatchParams, ValidationPolicy};
use std::{fs, path::Path};

/// Which [`sheet_inspect_match::MatchStrategy`] pairs features.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Greedy,
    Optimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    pub features: FeatureDetectorParams,
    pub markers: MarkerDetectParams,
    pub candidates: CandidateFilter,
    pub matching: MatchParams,
    pub strategy: StrategyKind,
    pub validation: ValidationPolicy,
    /// Camera-to-sheet distance for the calibrated scale; the calibration
    /// crate's fallback distance when absent.
    pub distance_mm: Option<f64>,
    /// Printed side of the fiducial markers. When set and a marker is
    /// visible, the marker fixes the scale instead of the calibration.
    pub marker_size_mm: Option<f64>,
    /// Remove lens distortion from positions before scaling.
    pub undistort: bool,
    /// Face inspected when no blueprint template identifies it.
    pub face: Face,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            features: FeatureDetectorParams::default(),
            markers: MarkerDetectParams::default(),
            candidates: CandidateFilter::default(),
            matching: MatchParams::default(),
            strategy: StrategyKind::default(),
            validation: ValidationPolicy::default(),
            distance_mm: None,
            marker_size_mm: None,
            undistort: true,
            face: Face::Front,
        }
    }
}

impl InspectionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, InspectError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InspectError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_independently() {
        let cfg = InspectionConfig::from_json_str(
            r#"{"strategy": "optimal", "distance_mm": 450.0, "features": {"holes": {"max_radius_px": 90}}}"#,
        )
        .expect("config");
        assert_eq!(cfg.strategy, StrategyKind::Optimal);
        assert_eq!(cfg.distance_mm, Some(450.0));
        assert_eq!(cfg.features.holes.max_radius_px, 90);
        assert_eq!(cfg.features.holes.min_radius_px, 10);
        assert_eq!(cfg.matching.max_distance_tolerance_mm, 15.0);
        assert!(cfg.undistort);
        assert!(matches!(
            InspectionConfig::from_json_str("{\"strategy\": 3}"),
            Err(InspectError::Json(_))
        ));
    }
}
