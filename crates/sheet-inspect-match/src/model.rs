//! Reference specification: sheet-level limits plus the expected feature list.

use crate::error::SpecError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::{FeatureType, Orientation};
use std::{fs, path::Path};

/// Sheet face a feature is drawn on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Face {
    #[default]
    #[serde(alias = "ANVERSO")]
    Front,
    #[serde(alias = "REVERSO")]
    Back,
}

impl From<Orientation> for Face {
    fn from(o: Orientation) -> Self {
        match o {
            Orientation::Front => Face::Front,
            Orientation::Back => Face::Back,
        }
    }
}

pub const DEFAULT_FEATURE_TOLERANCE_MM: f64 = 0.5;

fn default_tolerance() -> f64 {
    DEFAULT_FEATURE_TOLERANCE_MM
}

/// One feature the drawing expects, positioned in mm from the origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecificationFeature {
    #[serde(default)]
    pub face: Face,
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    #[serde(rename = "positionX_mm")]
    pub position_x_mm: f64,
    #[serde(rename = "positionY_mm")]
    pub position_y_mm: f64,
    pub diameter_mm: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance_mm: f64,
    #[serde(default, rename = "requireAlodine")]
    pub requires_alodine: bool,
    #[serde(default, rename = "requireCountersink")]
    pub requires_countersink: bool,
}

impl SpecificationFeature {
    pub fn new(feature_type: FeatureType, x_mm: f64, y_mm: f64, diameter_mm: f64) -> Self {
        Self {
            face: Face::Front,
            feature_type,
            position_x_mm: x_mm,
            position_y_mm: y_mm,
            diameter_mm,
            tolerance_mm: DEFAULT_FEATURE_TOLERANCE_MM,
            requires_alodine: false,
            requires_countersink: false,
        }
    }

    pub fn with_tolerance(mut self, tolerance_mm: f64) -> Self {
        self.tolerance_mm = tolerance_mm;
        self
    }

    pub fn requiring_alodine(mut self) -> Self {
        self.requires_alodine = true;
        self
    }

    pub fn requiring_countersink(mut self) -> Self {
        self.requires_countersink = true;
        self
    }

    pub fn position_mm(&self) -> Point2<f64> {
        Point2::new(self.position_x_mm, self.position_y_mm)
    }
}

/// Acceptance limits for a sheet type.
///
/// Missing keys take permissive defaults: `None` maxima and counts are
/// unchecked, and alodine is not required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Specification {
    pub name: String,
    pub sheet_type: String,

    pub min_width_mm: f64,
    pub max_width_mm: Option<f64>,
    pub min_height_mm: f64,
    pub max_height_mm: Option<f64>,

    pub expected_hole_count: Option<usize>,
    pub hole_min_diameter_mm: f64,
    pub hole_max_diameter_mm: Option<f64>,
    pub hole_tolerance: f64,
    pub hole_nominal_diameter_mm: Option<f64>,

    pub expected_countersink_count: Option<usize>,
    pub countersink_min_diameter_mm: f64,
    pub countersink_max_diameter_mm: Option<f64>,

    pub max_allowed_scratches: Option<usize>,
    pub max_scratch_length_mm: Option<f64>,
    pub max_allowed_deformations: Option<usize>,

    pub require_alodine_halo: bool,
    pub min_alodine_uniformity: f64,

    /// Position error (mm) above which a match is reported as misplaced.
    pub position_tolerance_mm: f64,
    pub features: Vec<SpecificationFeature>,
}

impl Default for Specification {
    fn default() -> Self {
        Self {
            name: String::new(),
            sheet_type: String::new(),
            min_width_mm: 0.0,
            max_width_mm: None,
            min_height_mm: 0.0,
            max_height_mm: None,
            expected_hole_count: None,
            hole_min_diameter_mm: 0.0,
            hole_max_diameter_mm: None,
            hole_tolerance: DEFAULT_FEATURE_TOLERANCE_MM,
            hole_nominal_diameter_mm: None,
            expected_countersink_count: None,
            countersink_min_diameter_mm: 0.0,
            countersink_max_diameter_mm: None,
            max_allowed_scratches: None,
            max_scratch_length_mm: None,
            max_allowed_deformations: None,
            require_alodine_halo: false,
            min_alodine_uniformity: 0.0,
            position_tolerance_mm: 5.0,
            features: Vec::new(),
        }
    }
}

impl Specification {
    pub fn from_json_str(json: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Expected features drawn on `face`.
    pub fn features_on(&self, face: Face) -> Vec<SpecificationFeature> {
        self.features
            .iter()
            .filter(|f| f.face == face)
            .cloned()
            .collect()
    }
}
