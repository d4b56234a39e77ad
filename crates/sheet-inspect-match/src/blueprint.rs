//! Reference drawings: expected hole layout for a sheet type.

use crate::error::SpecError;
use crate::model::SpecificationFeature;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::{DetectionItem, FeatureType};
use std::{fs, path::Path};

fn default_feature_tolerance() -> f64 {
    0.1
}

fn default_position_tolerance() -> f64 {
    5.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDimensions {
    pub width_mm: f64,
    pub height_mm: f64,
    #[serde(default)]
    pub thickness_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedHole {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub diameter_mm: f64,
    #[serde(default = "default_feature_tolerance")]
    pub tolerance_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedCountersink {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub outer_diameter_mm: f64,
    pub inner_diameter_mm: f64,
    #[serde(default = "default_feature_tolerance")]
    pub tolerance_mm: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintTolerances {
    pub dimension_tolerance_mm: f64,
    pub hole_diameter_tolerance_mm: f64,
    pub max_scratch_length_mm: f64,
    pub max_allowed_scratches: usize,
    pub max_deformation_mm: f64,
}

impl Default for BlueprintTolerances {
    fn default() -> Self {
        Self {
            dimension_tolerance_mm: 0.5,
            hole_diameter_tolerance_mm: 0.1,
            max_scratch_length_mm: 5.0,
            max_allowed_scratches: 2,
            max_deformation_mm: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dimensions: BlueprintDimensions,
    pub expected_hole_count: usize,
    #[serde(default)]
    pub expected_holes: Vec<ExpectedHole>,
    #[serde(default)]
    pub expected_countersinks: Vec<ExpectedCountersink>,
    #[serde(default)]
    pub tolerances: BlueprintTolerances,
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: f64,
    #[serde(default)]
    pub requires_alodine: bool,
}

impl Blueprint {
    pub fn from_json_str(json: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Expected holes and countersinks as front-face features.
    ///
    /// Countersinks are checked against their outer diameter.
    pub fn specification_features(&self) -> Vec<SpecificationFeature> {
        let holes = self.expected_holes.iter().map(|h| {
            let mut f = SpecificationFeature::new(FeatureType::Hole, h.x, h.y, h.diameter_mm)
                .with_tolerance(h.tolerance_mm);
            f.requires_alodine = self.requires_alodine;
            f
        });
        let sinks = self.expected_countersinks.iter().map(|c| {
            SpecificationFeature::new(FeatureType::Countersink, c.x, c.y, c.outer_diameter_mm)
                .with_tolerance(c.tolerance_mm)
                .requiring_countersink()
        });
        holes.chain(sinks).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlueprintIssue {
    HoleCount { expected: usize, found: usize },
    MissingHole { id: String },
    CountersinkCount { expected: usize, found: usize },
}

impl std::fmt::Display for BlueprintIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlueprintIssue::HoleCount { expected, found } => {
                write!(f, "hole count: expected {expected}, found {found}")
            }
            BlueprintIssue::MissingHole { id } => write!(f, "hole {id} missing"),
            BlueprintIssue::CountersinkCount { expected, found } => {
                write!(f, "countersink count: expected {expected}, found {found}")
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintValidation {
    pub passed: bool,
    pub issues: Vec<BlueprintIssue>,
}

/// Position used for blueprint checks: the mm measurement when present,
/// else the pixel center.
fn position(item: &DetectionItem) -> Point2<f64> {
    match item.measurement {
        Some(m) => m.position_mm,
        None => {
            let c = item.center_px();
            Point2::new(c.x as f64, c.y as f64)
        }
    }
}

/// Count and layout checks of detections against a blueprint.
///
/// An expected hole is present when some detected hole lies strictly
/// closer than `position_tolerance`.
pub fn validate_blueprint(detections: &[DetectionItem], blueprint: &Blueprint) -> BlueprintValidation {
    let holes: Vec<Point2<f64>> = detections
        .iter()
        .filter(|d| d.feature_type == FeatureType::Hole)
        .map(position)
        .collect();
    let mut issues = Vec::new();
    if holes.len() != blueprint.expected_hole_count {
        issues.push(BlueprintIssue::HoleCount {
            expected: blueprint.expected_hole_count,
            found: holes.len(),
        });
    }
    for h in &blueprint.expected_holes {
        let at = Point2::new(h.x, h.y);
        if !holes
            .iter()
            .any(|p| (p - at).norm() < blueprint.position_tolerance)
        {
            issues.push(BlueprintIssue::MissingHole { id: h.id.clone() });
        }
    }
    let sinks = detections
        .iter()
        .filter(|d| d.feature_type == FeatureType::Countersink)
        .count();
    if sinks != blueprint.expected_countersinks.len() {
        issues.push(BlueprintIssue::CountersinkCount {
            expected: blueprint.expected_countersinks.len(),
            found: sinks,
        });
    }
    for issue in &issues {
        log::info!("blueprint {}: {issue}", blueprint.id);
    }
    BlueprintValidation {
        passed: issues.is_empty(),
        issues,
    }
}
