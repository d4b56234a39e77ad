//! Judging detected sheet features against a reference specification.
//!
//! Detections enter as [`DetectedFeature`]s in millimeters, relative to the
//! same origin the [`Specification`] uses. [`FeatureMatcher`] pairs them
//! with the expected [`SpecificationFeature`]s (greedy nearest neighbour
//! by default, [`OptimalAssignment`] on request), then [`verdicts`] applies
//! the per-feature tolerance checks. [`SpecificationValidator`] covers the
//! sheet-wide rules and [`validate_blueprint`] the count/layout checks of a
//! reference drawing.
//!
//! ```
//! use sheet_inspect_features::FeatureType;
//! use sheet_inspect_match::{
//!     match_features, verdicts, DetectedFeature, DetectionStatus, MatchStatus,
//!     SpecificationFeature, ValidationPolicy,
//! };
//!
//! let expected = [SpecificationFeature::new(FeatureType::Hole, 100.0, 100.0, 10.0)];
//! let detected = [DetectedFeature::new(FeatureType::Hole, 102.0, 101.0, 10.3)];
//! let result = match_features(&expected, &detected, 15.0);
//! let v = verdicts(&result, &ValidationPolicy::default());
//! assert_eq!(v[0].status, MatchStatus::MatchOk);
//! assert_eq!(v[0].detection_status, DetectionStatus::Ok);
//! ```

mod blueprint;
mod detected;
mod error;
mod matcher;
mod model;
mod sheet_rules;
mod validate;

pub use blueprint::{
    validate_blueprint, Blueprint, BlueprintDimensions, BlueprintIssue, BlueprintTolerances,
    BlueprintValidation, ExpectedCountersink, ExpectedHole,
};
pub use detected::DetectedFeature;
pub use error::SpecError;
pub use matcher::{
    can_pair, match_features, FeatureMatcher, GreedyNearest, MatchParams, MatchStatus, MatchStrategy,
    MatchedFeature, MatchingResult, OptimalAssignment, DEFAULT_MAX_DISTANCE_MM,
};
pub use model::{Face, Specification, SpecificationFeature, DEFAULT_FEATURE_TOLERANCE_MM};
pub use sheet_rules::{RuleCheck, SheetValidation, SpecRule, SpecificationValidator};
pub use validate::{validate_feature_match, verdicts, DetectionStatus, ValidationPolicy, Verdict};
