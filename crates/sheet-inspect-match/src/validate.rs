//! Tolerance checks on matched features and per-feature verdicts.

use crate::detected::DetectedFeature;
use crate::matcher::{MatchStatus, MatchingResult};
use crate::model::SpecificationFeature;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::FeatureType;

/// Ordered from best to worst.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionStatus {
    #[default]
    Ok,
    Warning,
    NotAccepted,
}

impl DetectionStatus {
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Diameter errors above this share of the tolerance are a warning.
    pub warning_ratio: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self { warning_ratio: 0.8 }
    }
}

/// Diameter and finish check of one matched pair.
pub fn validate_feature_match(
    expected: &SpecificationFeature,
    detected: &DetectedFeature,
    policy: &ValidationPolicy,
) -> DetectionStatus {
    let diff = (detected.diameter_mm - expected.diameter_mm).abs();
    if diff > expected.tolerance_mm {
        return DetectionStatus::NotAccepted;
    }
    if expected.requires_alodine && !detected.has_alodine {
        return DetectionStatus::NotAccepted;
    }
    if expected.requires_countersink && detected.feature_type != FeatureType::Countersink {
        return DetectionStatus::NotAccepted;
    }
    if diff > policy.warning_ratio * expected.tolerance_mm {
        return DetectionStatus::Warning;
    }
    DetectionStatus::Ok
}

/// Outcome for one expected feature or one extra detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub status: MatchStatus,
    pub distance_error_mm: Option<f64>,
    pub detection_status: DetectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<SpecificationFeature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected: Option<DetectedFeature>,
}

impl Verdict {
    /// Matched in place and not rejected.
    pub fn is_accepted(&self) -> bool {
        self.status == MatchStatus::MatchOk && self.detection_status != DetectionStatus::NotAccepted
    }
}

/// Verdicts for matches, then missing features, then extras.
///
/// Missing features and extra detections are never accepted.
pub fn verdicts(result: &MatchingResult, policy: &ValidationPolicy) -> Vec<Verdict> {
    let matched = result.matches.iter().map(|m| Verdict {
        status: m.status,
        distance_error_mm: Some(m.distance_error_mm),
        detection_status: validate_feature_match(&m.expected, &m.detected, policy),
        expected: Some(m.expected.clone()),
        detected: Some(m.detected.clone()),
    });
    let missing = result.missing.iter().map(|e| Verdict {
        status: MatchStatus::Missing,
        distance_error_mm: None,
        detection_status: DetectionStatus::NotAccepted,
        expected: Some(e.clone()),
        detected: None,
    });
    let extras = result.extras.iter().map(|d| Verdict {
        status: MatchStatus::Extra,
        distance_error_mm: None,
        detection_status: DetectionStatus::NotAccepted,
        expected: None,
        detected: Some(d.clone()),
    });
    matched.chain(missing).chain(extras).collect()
}
