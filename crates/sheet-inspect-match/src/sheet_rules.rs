//! Sheet-level acceptance rules of a [`Specification`].

use crate::model::Specification;
use crate::validate::DetectionStatus;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::{DetectionItem, FeatureType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecRule {
    SheetDimensions,
    HoleDiameter,
    HoleCount,
    CountersinkDiameter,
    CountersinkCount,
    ScratchLength,
    ScratchCount,
    DeformationCount,
    Alodine,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule: SpecRule,
    pub status: DetectionStatus,
    /// Measured value the rule looked at (mm, count or ratio).
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetValidation {
    pub status: DetectionStatus,
    pub checks: Vec<RuleCheck>,
}

impl SheetValidation {
    fn push(&mut self, rule: SpecRule, status: DetectionStatus, value: f64) {
        self.status = self.status.worst(status);
        self.checks.push(RuleCheck {
            rule,
            status,
            value,
        });
    }

    pub fn failed(&self) -> impl Iterator<Item = &RuleCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == DetectionStatus::NotAccepted)
    }
}

fn outside(v: f64, min: f64, max: Option<f64>) -> bool {
    v < min || max.is_some_and(|m| v > m)
}

fn verdict(reject: bool) -> DetectionStatus {
    if reject {
        DetectionStatus::NotAccepted
    } else {
        DetectionStatus::Ok
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpecificationValidator {
    spec: Specification,
}

impl SpecificationValidator {
    pub fn new(spec: Specification) -> Self {
        Self { spec }
    }

    pub fn specification(&self) -> &Specification {
        &self.spec
    }

    /// Out of range is rejected; off nominal by more than the tolerance is a warning.
    pub fn validate_hole(&self, diameter_mm: f64) -> DetectionStatus {
        let s = &self.spec;
        if outside(diameter_mm, s.hole_min_diameter_mm, s.hole_max_diameter_mm) {
            return DetectionStatus::NotAccepted;
        }
        match s.hole_nominal_diameter_mm {
            Some(nominal) if (diameter_mm - nominal).abs() > s.hole_tolerance => {
                DetectionStatus::Warning
            }
            _ => DetectionStatus::Ok,
        }
    }

    pub fn validate_countersink(&self, diameter_mm: f64) -> DetectionStatus {
        let s = &self.spec;
        verdict(outside(
            diameter_mm,
            s.countersink_min_diameter_mm,
            s.countersink_max_diameter_mm,
        ))
    }

    pub fn validate_scratch(&self, length_mm: f64) -> DetectionStatus {
        verdict(self.spec.max_scratch_length_mm.is_some_and(|m| length_mm > m))
    }

    pub fn validate_deformations(&self, count: usize) -> DetectionStatus {
        verdict(self.spec.max_allowed_deformations.is_some_and(|m| count > m))
    }

    /// Only checked when the specification requires a halo.
    pub fn validate_alodine(&self, uniformity: f64) -> DetectionStatus {
        let s = &self.spec;
        verdict(s.require_alodine_halo && uniformity < s.min_alodine_uniformity)
    }

    pub fn validate_sheet_dimensions(&self, width_mm: f64, height_mm: f64) -> DetectionStatus {
        let s = &self.spec;
        verdict(
            outside(width_mm, s.min_width_mm, s.max_width_mm)
                || outside(height_mm, s.min_height_mm, s.max_height_mm),
        )
    }

    /// All sheet rules over measured detection items.
    ///
    /// Unmeasured items are ignored. Alodine uniformity is the mean halo
    /// coverage over all holes and countersinks, counting a hole without
    /// a halo as zero.
    pub fn validate_items(&self, items: &[DetectionItem]) -> SheetValidation {
        let s = &self.spec;
        let mut out = SheetValidation::default();
        let measured = |ty: FeatureType| {
            items
                .iter()
                .filter(move |i| i.feature_type == ty)
                .filter_map(|i| i.measurement)
        };

        if let Some(m) = measured(FeatureType::Sheet).next() {
            if let (Some(w), Some(h)) = (m.width_mm, m.height_mm) {
                out.push(
                    SpecRule::SheetDimensions,
                    self.validate_sheet_dimensions(w, h),
                    w * h,
                );
            }
        }

        let mut holes = 0usize;
        for d in measured(FeatureType::Hole).filter_map(|m| m.diameter_mm) {
            holes += 1;
            out.push(SpecRule::HoleDiameter, self.validate_hole(d), d);
        }
        if let Some(n) = s.expected_hole_count {
            out.push(SpecRule::HoleCount, verdict(holes != n), holes as f64);
        }

        let mut sinks = 0usize;
        for d in measured(FeatureType::Countersink).filter_map(|m| m.diameter_mm) {
            sinks += 1;
            out.push(SpecRule::CountersinkDiameter, self.validate_countersink(d), d);
        }
        if let Some(n) = s.expected_countersink_count {
            out.push(SpecRule::CountersinkCount, verdict(sinks != n), sinks as f64);
        }

        let mut scratches = 0usize;
        for l in measured(FeatureType::Scratch).filter_map(|m| m.length_mm) {
            scratches += 1;
            out.push(SpecRule::ScratchLength, self.validate_scratch(l), l);
        }
        if let Some(max) = s.max_allowed_scratches {
            out.push(SpecRule::ScratchCount, verdict(scratches > max), scratches as f64);
        }

        let deformations = measured(FeatureType::Deformation).count();
        out.push(
            SpecRule::DeformationCount,
            self.validate_deformations(deformations),
            deformations as f64,
        );

        if s.require_alodine_halo {
            let drilled = items
                .iter()
                .filter(|i| matches!(i.feature_type, FeatureType::Hole | FeatureType::Countersink))
                .count();
            let coverage: f64 = items
                .iter()
                .filter(|i| i.feature_type == FeatureType::AlodineHalo)
                .map(|i| i.confidence as f64)
                .sum();
            let uniformity = if drilled == 0 {
                0.0
            } else {
                coverage / drilled as f64
            };
            out.push(SpecRule::Alodine, self.validate_alodine(uniformity), uniformity);
        }
        log::debug!(
            "sheet rules: {} checks, overall {:?}",
            out.checks.len(),
            out.status
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use sheet_inspect_core::{Circle, LineSegment, Rect};
    use sheet_inspect_features::{Measurement, PixelGeometry};

    fn spec() -> Specification {
        Specification {
            min_width_mm: 190.0,
            max_width_mm: Some(210.0),
            min_height_mm: 90.0,
            max_height_mm: Some(110.0),
            expected_hole_count: Some(2),
            hole_min_diameter_mm: 5.5,
            hole_max_diameter_mm: Some(6.5),
            hole_tolerance: 0.1,
            hole_nominal_diameter_mm: Some(6.0),
            countersink_min_diameter_mm: 8.0,
            countersink_max_diameter_mm: Some(9.0),
            max_allowed_scratches: Some(1),
            max_scratch_length_mm: Some(5.0),
            max_allowed_deformations: Some(0),
            require_alodine_halo: true,
            min_alodine_uniformity: 0.5,
            ..Specification::default()
        }
    }

    #[test]
    fn single_rules_follow_the_limits() {
        let v = SpecificationValidator::new(spec());
        assert_eq!(v.validate_hole(5.0), DetectionStatus::NotAccepted);
        assert_eq!(v.validate_hole(6.3), DetectionStatus::Warning);
        assert_eq!(v.validate_hole(6.05), DetectionStatus::Ok);
        assert_eq!(v.validate_countersink(9.5), DetectionStatus::NotAccepted);
        assert_eq!(v.validate_scratch(5.0), DetectionStatus::Ok);
        assert_eq!(v.validate_scratch(5.1), DetectionStatus::NotAccepted);
        assert_eq!(v.validate_deformations(1), DetectionStatus::NotAccepted);
        assert_eq!(v.validate_alodine(0.4), DetectionStatus::NotAccepted);
        assert_eq!(v.validate_sheet_dimensions(200.0, 100.0), DetectionStatus::Ok);
        assert_eq!(v.validate_sheet_dimensions(200.0, 120.0), DetectionStatus::NotAccepted);

        let lax = SpecificationValidator::default();
        assert_eq!(lax.validate_alodine(0.0), DetectionStatus::Ok);
        assert_eq!(lax.validate_scratch(1e6), DetectionStatus::Ok);
    }

    fn measured(ty: FeatureType, geometry: PixelGeometry, conf: f32, m: Measurement) -> DetectionItem {
        let mut item = DetectionItem::new(ty, geometry, conf);
        item.measurement = Some(m);
        item
    }

    #[test]
    fn items_are_checked_against_every_rule() {
        let circle = PixelGeometry::Circle(Circle {
            center: Point2::new(0.0, 0.0),
            radius: 5.0,
        });
        let hole = |d: f64| {
            let mut m = Measurement::at(Point2::origin());
            m.diameter_mm = Some(d);
            measured(FeatureType::Hole, circle.clone(), 1.0, m)
        };
        let mut sheet_m = Measurement::at(Point2::origin());
        sheet_m.width_mm = Some(200.0);
        sheet_m.height_mm = Some(100.0);
        let mut scratch_m = Measurement::at(Point2::origin());
        scratch_m.length_mm = Some(7.0);
        let items = vec![
            measured(
                FeatureType::Sheet,
                PixelGeometry::Box(Rect::new(0.0, 0.0, 10.0, 10.0)),
                1.0,
                sheet_m,
            ),
            hole(6.0),
            hole(6.3),
            measured(
                FeatureType::AlodineHalo,
                circle.clone(),
                0.9,
                Measurement::at(Point2::origin()),
            ),
            measured(
                FeatureType::Scratch,
                PixelGeometry::Line(LineSegment {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(1.0, 0.0),
                }),
                1.0,
                scratch_m,
            ),
        ];
        let report = SpecificationValidator::new(spec()).validate_items(&items);
        assert_eq!(report.status, DetectionStatus::NotAccepted);
        let failed: Vec<SpecRule> = report.failed().map(|c| c.rule).collect();
        // Coverage 0.9 over two holes is below the required 0.5 mean.
        assert_eq!(failed, vec![SpecRule::ScratchLength, SpecRule::Alodine]);
        assert!(report
            .checks
            .iter()
            .any(|c| c.rule == SpecRule::HoleDiameter && c.status == DetectionStatus::Warning));
    }
}
