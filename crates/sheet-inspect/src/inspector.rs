//! One-frame inspection: scale, origin, features, matching and verdicts.

use crate::config::{InspectionConfig, StrategyKind};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_calib::{scale_factor, CameraCalibration, FALLBACK_DISTANCE_MM};
use sheet_inspect_core::RgbImageView;
use sheet_inspect_features::{
    choose_origin, BlueprintMatch, BlueprintMatcher, DetectionItem, ExternalCandidate,
    FeatureDetector, FeatureType, PixelToMm,
};
use sheet_inspect_markers::{FiducialMarker, MarkerResolver};
use sheet_inspect_match::{
    can_pair, verdicts, DetectedFeature, Face, FeatureMatcher, MatchParams, MatchingResult,
    DetectionStatus, OptimalAssignment, SheetValidation, Specification, SpecificationFeature,
    SpecificationValidator, Verdict,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Where the frame's mm-per-pixel scale came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSource {
    /// Printed marker side over its observed side.
    Marker,
    Calibration,
    /// No usable calibration; the constant fallback scale.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub width: usize,
    pub height: usize,
    pub scale_mm_per_px: f64,
    pub scale_source: ScaleSource,
    /// Pixel position of the mm origin.
    pub origin_px: Point2<f64>,
    pub face: Face,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<BlueprintMatch>,
    pub markers: Vec<FiducialMarker>,
    /// Every detection, measured in mm.
    pub items: Vec<DetectionItem>,
    pub matching: MatchingResult,
    pub verdicts: Vec<Verdict>,
    pub sheet_rules: SheetValidation,
    pub passed: bool,
}

impl InspectionReport {
    /// Verdicts that reject the part.
    pub fn rejected(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.is_accepted())
    }
}

/// Runs the whole pipeline against one specification.
#[derive(Debug)]
pub struct Inspector {
    config: InspectionConfig,
    detector: FeatureDetector,
    resolver: MarkerResolver,
    calibration: Option<CameraCalibration>,
    validator: SpecificationValidator,
    blueprints: Option<BlueprintMatcher>,
}

impl Inspector {
    pub fn new(specification: Specification, config: InspectionConfig) -> Self {
        Self {
            detector: FeatureDetector::new(config.features),
            resolver: MarkerResolver::new(config.markers.clone()),
            calibration: None,
            validator: SpecificationValidator::new(specification),
            blueprints: None,
            config,
        }
    }

    pub fn with_calibration(mut self, calibration: Option<CameraCalibration>) -> Self {
        self.calibration = calibration;
        self
    }

    /// Templates used to pick the inspected face per frame.
    pub fn with_blueprints(mut self, blueprints: BlueprintMatcher) -> Self {
        self.blueprints = Some(blueprints);
        self
    }

    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    pub fn specification(&self) -> &Specification {
        self.validator.specification()
    }

    pub fn calibration(&self) -> Option<&CameraCalibration> {
        self.calibration.as_ref()
    }

    /// Scale from the first marker when its printed size is configured,
    /// otherwise from the calibration at the configured distance.
    pub fn scale(&self, markers: &[FiducialMarker]) -> (f64, ScaleSource) {
        if let (Some(size_mm), Some(m)) = (self.config.marker_size_mm, markers.first()) {
            let side = m.side_px() as f64;
            if side > f64::EPSILON && size_mm > 0.0 {
                return (size_mm / side, ScaleSource::Marker);
            }
        }
        let distance = self.config.distance_mm.unwrap_or(FALLBACK_DISTANCE_MM);
        let scale = scale_factor(self.calibration.as_ref(), distance);
        let source = match &self.calibration {
            Some(c) if c.is_usable() => ScaleSource::Calibration,
            _ => ScaleSource::Fallback,
        };
        (scale, source)
    }

    pub fn inspect(&self, frame: &RgbImageView<'_>) -> InspectionReport {
        self.inspect_with_candidates(frame, &[])
    }

    /// Inspection with extra detections from an external model merged in
    /// after the geometric ones.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(w = frame.width, h = frame.height, candidates = candidates.len()))
    )]
    pub fn inspect_with_candidates(
        &self,
        frame: &RgbImageView<'_>,
        candidates: &[ExternalCandidate],
    ) -> InspectionReport {
        let gray = frame.to_gray();
        let markers = self.resolver.detect_markers(&gray.view());
        let blueprint = self
            .blueprints
            .as_ref()
            .and_then(|b| b.match_blueprint(&gray.view()));
        let face = blueprint
            .as_ref()
            .map_or(self.config.face, |b| Face::from(b.orientation));

        let report = self.detector.detect_report(frame);
        let mut items = report.items();
        items.extend(self.config.candidates.normalize(candidates));

        let (scale, scale_source) = self.scale(&markers);
        let origin = choose_origin(&markers, report.sheet.as_ref());
        let mut to_mm = PixelToMm::new(scale, origin);
        if self.config.undistort {
            if let Some(cal) = self.calibration.as_ref().filter(|c| c.is_usable()) {
                to_mm = to_mm.with_undistortion(cal.intrinsics, cal.distortion);
            }
        }
        to_mm.measure_all(&mut items);

        let spec = self.validator.specification();
        let expected = spec.features_on(face);
        let detected: Vec<DetectedFeature> = DetectedFeature::from_items(&items)
            .into_iter()
            .filter(|d| expected.iter().any(|e| can_pair(e, d)))
            .collect();
        let matching = self.run_matcher(spec, &expected, &detected);
        let verdicts = verdicts(&matching, &self.config.validation);
        let sheet_rules = self.validator.validate_items(&items);

        let passed = verdicts.iter().all(Verdict::is_accepted)
            && sheet_rules.status != DetectionStatus::NotAccepted;
        log::info!(
            "inspection: {} items, {} expected on {:?}, {} rejected, scale {scale:.4} mm/px ({scale_source:?}), {}",
            items.len(),
            expected.len(),
            face,
            verdicts.iter().filter(|v| !v.is_accepted()).count(),
            if passed { "passed" } else { "failed" },
        );

        InspectionReport {
            width: frame.width,
            height: frame.height,
            scale_mm_per_px: scale,
            scale_source,
            origin_px: origin,
            face,
            blueprint,
            markers,
            items,
            matching,
            verdicts,
            sheet_rules,
            passed,
        }
    }

    fn run_matcher(
        &self,
        spec: &Specification,
        expected: &[SpecificationFeature],
        detected: &[DetectedFeature],
    ) -> MatchingResult {
        let params = MatchParams {
            position_tolerance_mm: spec.position_tolerance_mm,
            ..self.config.matching
        };
        match self.config.strategy {
            StrategyKind::Greedy => FeatureMatcher::new(params).run(expected, detected),
            StrategyKind::Optimal => {
                FeatureMatcher::with_strategy(params, OptimalAssignment).run(expected, detected)
            }
        }
    }
}

/// Detection counts per type, for logs and summaries.
pub fn type_counts(items: &[DetectionItem]) -> Vec<(FeatureType, usize)> {
    FeatureType::ALL
        .iter()
        .map(|&ty| (ty, items.iter().filter(|i| i.feature_type == ty).count()))
        .filter(|&(_, n)| n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sheet_inspect_calib::{io::calibration_from_json, FALLBACK_SCALE_MM_PER_PX};
    use sheet_inspect_core::{Rect, RgbImage};
    use sheet_inspect_match::MatchStatus;

    fn calibration(fx: f64) -> CameraCalibration {
        let json = format!(
            r#"{{
                "cameraMatrix": [{fx}, 0.0, 120.0, 0.0, {fx}, 90.0, 0.0, 0.0, 1.0],
                "distortionCoeffs": [0.0, 0.0, 0.0, 0.0, 0.0],
                "calibrationDate": "2026-01-01 10:00:00",
                "resolution": [240, 180]
            }}"#
        );
        calibration_from_json(&json).expect("calibration")
    }

    fn plate_with_holes() -> RgbImage {
        let mut img = RgbImage::new(240, 180, [30, 30, 30]);
        for y in 20..160 {
            for x in 20..220 {
                img.set(x, y, [200, 200, 200]);
            }
        }
        for (cx, cy, r) in [(70.0f32, 60.0f32, 15.0f32), (160.0, 90.0, 20.0)] {
            for y in 0..180 {
                for x in 0..240 {
                    let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                    if dx * dx + dy * dy <= r * r {
                        img.set(x, y, [25, 25, 25]);
                    }
                }
            }
        }
        img
    }

    fn spec_for(face: Face) -> Specification {
        let mut spec = Specification::default();
        // Origin is the plate's top-left corner, 0.5 mm per pixel.
        let mut near = SpecificationFeature::new(FeatureType::Hole, 25.5, 20.5, 15.0).with_tolerance(1.5);
        near.face = face;
        let mut far = SpecificationFeature::new(FeatureType::Hole, 70.5, 35.5, 20.0).with_tolerance(1.5);
        far.face = face;
        spec.features = vec![near, far];
        spec
    }

    fn config() -> InspectionConfig {
        InspectionConfig {
            distance_mm: Some(500.0),
            ..InspectionConfig::default()
        }
    }

    #[test]
    fn scale_prefers_markers_then_calibration() {
        let inspector = Inspector::new(Specification::default(), InspectionConfig::default());
        let (s, src) = inspector.scale(&[]);
        assert_relative_eq!(s, FALLBACK_SCALE_MM_PER_PX);
        assert_eq!(src, ScaleSource::Fallback);

        let inspector = Inspector::new(Specification::default(), config())
            .with_calibration(Some(calibration(1000.0)));
        let (s, src) = inspector.scale(&[]);
        assert_relative_eq!(s, 0.5);
        assert_eq!(src, ScaleSource::Calibration);

        let cfg = InspectionConfig {
            marker_size_mm: Some(20.0),
            ..config()
        };
        let inspector = Inspector::new(Specification::default(), cfg);
        let marker = FiducialMarker {
            id: 3,
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(40.0, 0.0),
                Point2::new(40.0, 40.0),
                Point2::new(0.0, 40.0),
            ],
        };
        let (s, src) = inspector.scale(&[marker]);
        assert_relative_eq!(s, 0.5);
        assert_eq!(src, ScaleSource::Marker);
    }

    #[test]
    fn holes_in_place_pass() {
        let img = plate_with_holes();
        let inspector = Inspector::new(spec_for(Face::Front), config())
            .with_calibration(Some(calibration(1000.0)));
        let report = inspector.inspect(&img.view());
        assert_eq!(report.scale_source, ScaleSource::Calibration);
        assert_eq!(report.matching.matches.len(), 2, "{:?}", report.matching);
        for m in &report.matching.matches {
            assert_eq!(m.status, MatchStatus::MatchOk, "{m:?}");
            assert!(m.distance_error_mm < 1.5, "{m:?}");
        }
        assert!(report.verdicts[..2].iter().all(Verdict::is_accepted), "{:?}", report.verdicts);
        assert!(type_counts(&report.items).contains(&(FeatureType::Hole, 2)));
    }

    #[test]
    fn back_face_features_are_not_expected_on_the_front() {
        let img = plate_with_holes();
        let inspector = Inspector::new(spec_for(Face::Back), config())
            .with_calibration(Some(calibration(1000.0)));
        let report = inspector.inspect(&img.view());
        assert_eq!(report.face, Face::Front);
        assert!(report.matching.matches.is_empty());
        assert_eq!(report.matching.extras.len(), 0);
        assert!(report.passed);
    }

    #[test]
    fn unmatched_candidate_fails_the_part() {
        let img = plate_with_holes();
        let inspector = Inspector::new(spec_for(Face::Front), config())
            .with_calibration(Some(calibration(1000.0)));
        let extra = ExternalCandidate::boxed("agujero", Rect::new(190.0, 130.0, 16.0, 16.0), 0.9);
        let report = inspector.inspect_with_candidates(&img.view(), &[extra]);
        assert_eq!(report.matching.extras.len(), 1);
        assert!(!report.passed);
        assert_eq!(report.rejected().count(), 1);
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["scaleSource"], "calibration");
        assert_eq!(json["passed"], false);
        assert_eq!(json["verdicts"][2]["status"], "EXTRA");
    }
}
