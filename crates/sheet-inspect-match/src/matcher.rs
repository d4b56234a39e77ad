//! Pairing expected features with detections in mm space.

use crate::detected::DetectedFeature;
use crate::model::SpecificationFeature;
use serde::{Deserialize, Serialize};
use sheet_inspect_features::FeatureType;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Search radius for a detection to count as the same feature (mm).
pub const DEFAULT_MAX_DISTANCE_MM: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    MatchOk,
    PositionError,
    Missing,
    Extra,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// A detection farther than this from an expected feature never pairs with it.
    pub max_distance_tolerance_mm: f64,
    /// Paired features farther apart than this are [`MatchStatus::PositionError`].
    pub position_tolerance_mm: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            max_distance_tolerance_mm: DEFAULT_MAX_DISTANCE_MM,
            position_tolerance_mm: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedFeature {
    pub expected: SpecificationFeature,
    pub detected: DetectedFeature,
    pub distance_error_mm: f64,
    pub status: MatchStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    /// In expected-feature order.
    pub matches: Vec<MatchedFeature>,
    pub missing: Vec<SpecificationFeature>,
    pub extras: Vec<DetectedFeature>,
}

/// Assignment of detections to expected features.
pub trait MatchStrategy {
    /// For each expected feature, the index of the detection it takes.
    ///
    /// A detection is used at most once, only for an expected feature it
    /// can stand for (see [`can_pair`]), and only within `max_distance_mm`.
    fn assign(
        &self,
        expected: &[SpecificationFeature],
        detected: &[DetectedFeature],
        max_distance_mm: f64,
    ) -> Vec<Option<usize>>;
}

fn distance(e: &SpecificationFeature, d: &DetectedFeature) -> f64 {
    (e.position_mm() - d.position_mm).norm()
}

/// Same type, or a countersunk detection for a hole that must be countersunk.
pub fn can_pair(e: &SpecificationFeature, d: &DetectedFeature) -> bool {
    d.feature_type == e.feature_type
        || (e.feature_type == FeatureType::Hole
            && e.requires_countersink
            && d.feature_type == FeatureType::Countersink)
}

// Holes and countersinks compete for the same detections.
fn pairing_family(ty: FeatureType) -> FeatureType {
    match ty {
        FeatureType::Countersink => FeatureType::Hole,
        other => other,
    }
}

/// Nearest free detection, expected features taken in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyNearest;

impl MatchStrategy for GreedyNearest {
    fn assign(
        &self,
        expected: &[SpecificationFeature],
        detected: &[DetectedFeature],
        max_distance_mm: f64,
    ) -> Vec<Option<usize>> {
        let mut used = vec![false; detected.len()];
        expected
            .iter()
            .map(|e| {
                let mut best: Option<(usize, f64)> = None;
                for (j, d) in detected.iter().enumerate() {
                    if used[j] || !can_pair(e, d) {
                        continue;
                    }
                    let dist = distance(e, d);
                    // Strict: the first minimum wins.
                    if best.is_none_or(|(_, bd)| dist < bd) {
                        best = Some((j, dist));
                    }
                }
                let (j, dist) = best?;
                (dist <= max_distance_mm).then(|| {
                    used[j] = true;
                    j
                })
            })
            .collect()
    }
}

/// Minimum total distance per feature type, holes and countersinks
/// solved together.
///
/// Among the assignments with the most pairs inside the search radius,
/// picks the one with the smallest summed distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimalAssignment;

impl MatchStrategy for OptimalAssignment {
    fn assign(
        &self,
        expected: &[SpecificationFeature],
        detected: &[DetectedFeature],
        max_distance_mm: f64,
    ) -> Vec<Option<usize>> {
        let mut out = vec![None; expected.len()];
        let mut families: Vec<_> = expected
            .iter()
            .map(|e| pairing_family(e.feature_type))
            .collect();
        families.sort();
        families.dedup();
        for family in families {
            let rows: Vec<usize> = (0..expected.len())
                .filter(|&i| pairing_family(expected[i].feature_type) == family)
                .collect();
            let cols: Vec<usize> = (0..detected.len())
                .filter(|&j| pairing_family(detected[j].feature_type) == family)
                .collect();
            if cols.is_empty() {
                continue;
            }
            let n = rows.len().max(cols.len());
            let forbidden = n as f64 * (max_distance_mm.max(0.0) + 1.0) + 1.0;
            let mut cost = vec![0.0; n * n];
            for (r, &i) in rows.iter().enumerate() {
                for (c, &j) in cols.iter().enumerate() {
                    let d = distance(&expected[i], &detected[j]);
                    let allowed = d <= max_distance_mm && can_pair(&expected[i], &detected[j]);
                    cost[r * n + c] = if allowed { d } else { forbidden };
                }
            }
            for (r, c) in hungarian(&cost, n).into_iter().enumerate() {
                if r >= rows.len() || c >= cols.len() {
                    continue;
                }
                let (i, j) = (rows[r], cols[c]);
                if can_pair(&expected[i], &detected[j])
                    && distance(&expected[i], &detected[j]) <= max_distance_mm
                {
                    out[i] = Some(j);
                }
            }
        }
        out
    }
}

/// Minimum-cost perfect assignment on a square `n × n` row-major matrix.
/// Returns the column chosen for each row.
fn hungarian(cost: &[f64], n: usize) -> Vec<usize> {
    // 1-based potentials; column 0 is the virtual start.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];
    for i in 1..=n {
        owner[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost[(i0 - 1) * n + (j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }
    let mut cols = vec![0usize; n];
    for j in 1..=n {
        if owner[j] > 0 {
            cols[owner[j] - 1] = j - 1;
        }
    }
    cols
}

/// Runs a [`MatchStrategy`] and sorts the outcome into matches, missing
/// features and extra detections.
#[derive(Clone, Debug, Default)]
pub struct FeatureMatcher<S = GreedyNearest> {
    params: MatchParams,
    strategy: S,
}

impl FeatureMatcher<GreedyNearest> {
    pub fn new(params: MatchParams) -> Self {
        Self {
            params,
            strategy: GreedyNearest,
        }
    }
}

impl<S: MatchStrategy> FeatureMatcher<S> {
    pub fn with_strategy(params: MatchParams, strategy: S) -> Self {
        Self { params, strategy }
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(expected = expected.len(), detected = detected.len()))
    )]
    pub fn run(
        &self,
        expected: &[SpecificationFeature],
        detected: &[DetectedFeature],
    ) -> MatchingResult {
        let p = &self.params;
        let assignment = self
            .strategy
            .assign(expected, detected, p.max_distance_tolerance_mm);
        let mut taken = vec![false; detected.len()];
        let mut result = MatchingResult::default();
        for (e, slot) in expected.iter().zip(assignment) {
            let Some(j) = slot.filter(|&j| j < detected.len() && !taken[j]) else {
                result.missing.push(e.clone());
                continue;
            };
            taken[j] = true;
            let d = &detected[j];
            let dist = distance(e, d);
            let status = if dist > p.position_tolerance_mm {
                MatchStatus::PositionError
            } else {
                MatchStatus::MatchOk
            };
            result.matches.push(MatchedFeature {
                expected: e.clone(),
                detected: d.clone(),
                distance_error_mm: dist,
                status,
            });
        }
        result.extras = detected
            .iter()
            .zip(&taken)
            .filter(|(_, &t)| !t)
            .map(|(d, _)| d.clone())
            .collect();
        log::debug!(
            "matching: {} matched, {} missing, {} extra",
            result.matches.len(),
            result.missing.len(),
            result.extras.len()
        );
        result
    }
}

/// Greedy matching with the default position tolerance.
pub fn match_features(
    expected: &[SpecificationFeature],
    detected: &[DetectedFeature],
    max_distance_tolerance_mm: f64,
) -> MatchingResult {
    FeatureMatcher::new(MatchParams {
        max_distance_tolerance_mm,
        ..MatchParams::default()
    })
    .run(expected, detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sheet_inspect_features::FeatureType;

    fn hole(x: f64, y: f64) -> SpecificationFeature {
        SpecificationFeature::new(FeatureType::Hole, x, y, 10.0)
    }

    fn det(ty: FeatureType, x: f64, y: f64) -> DetectedFeature {
        DetectedFeature::new(ty, x, y, 10.0)
    }

    #[test]
    fn nearby_hole_matches() {
        let r = match_features(
            &[hole(100.0, 100.0)],
            &[det(FeatureType::Hole, 102.0, 101.0)],
            DEFAULT_MAX_DISTANCE_MM,
        );
        assert_eq!(r.matches.len(), 1);
        assert_eq!(r.matches[0].status, MatchStatus::MatchOk);
        assert_relative_eq!(r.matches[0].distance_error_mm, 5f64.sqrt(), epsilon = 1e-12);
        assert!(r.missing.is_empty() && r.extras.is_empty());
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let expected = [hole(0.0, 0.0)];
        let at = match_features(&expected, &[det(FeatureType::Hole, 15.0, 0.0)], 15.0);
        assert_eq!(at.matches.len(), 1);
        assert_eq!(at.matches[0].status, MatchStatus::PositionError);
        let past = match_features(&expected, &[det(FeatureType::Hole, 15.0 + 1e-9, 0.0)], 15.0);
        assert!(past.matches.is_empty());
        assert_eq!(past.missing.len(), 1);
        assert_eq!(past.extras.len(), 1);
    }

    #[test]
    fn types_never_cross() {
        let r = match_features(
            &[hole(0.0, 0.0)],
            &[det(FeatureType::Countersink, 0.0, 0.0)],
            DEFAULT_MAX_DISTANCE_MM,
        );
        assert_eq!(r.missing.len(), 1);
        assert_eq!(r.extras.len(), 1);
    }

    #[test]
    fn countersunk_holes_accept_countersink_detections() {
        let spec = [hole(10.0, 10.0).requiring_countersink()];
        let sunk = [det(FeatureType::Countersink, 11.0, 10.0)];
        for strategy in [&GreedyNearest as &dyn MatchStrategy, &OptimalAssignment] {
            assert_eq!(strategy.assign(&spec, &sunk, 15.0), vec![Some(0)]);
        }
        // A plain hole still pairs, so validation can reject it.
        let plain = [det(FeatureType::Hole, 11.0, 10.0)];
        assert_eq!(OptimalAssignment.assign(&spec, &plain, 15.0), vec![Some(0)]);
        // Without the requirement a countersink stays unpaired.
        assert_eq!(OptimalAssignment.assign(&[hole(10.0, 10.0)], &sunk, 15.0), vec![None]);
    }

    #[test]
    fn countersink_and_hole_specs_share_detections_optimally() {
        let expected = [
            SpecificationFeature::new(FeatureType::Countersink, 0.0, 0.0, 10.0),
            hole(6.0, 0.0).requiring_countersink(),
        ];
        let detected = [
            det(FeatureType::Countersink, 5.0, 0.0),
            det(FeatureType::Countersink, -2.0, 0.0),
        ];
        let a = OptimalAssignment.assign(&expected, &detected, 15.0);
        assert_eq!(a, vec![Some(1), Some(0)]);
    }

    #[test]
    fn greedy_ties_keep_the_first_detection() {
        let detected = [det(FeatureType::Hole, -3.0, 0.0), det(FeatureType::Hole, 3.0, 0.0)];
        let a = GreedyNearest.assign(&[hole(0.0, 0.0)], &detected, 15.0);
        assert_eq!(a, vec![Some(0)]);
    }

    #[test]
    fn optimal_assignment_beats_greedy_on_crossed_pairs() {
        // Greedy gives the first hole the detection the second one needs.
        let expected = [hole(0.0, 0.0), hole(10.0, 0.0)];
        let detected = [det(FeatureType::Hole, 4.0, 0.0), det(FeatureType::Hole, -8.0, 0.0)];

        let params = MatchParams {
            max_distance_tolerance_mm: 20.0,
            ..MatchParams::default()
        };
        let greedy = FeatureMatcher::new(params).run(&expected, &detected);
        let total = |r: &MatchingResult| r.matches.iter().map(|m| m.distance_error_mm).sum::<f64>();
        assert_eq!(greedy.matches.len(), 2);
        assert_relative_eq!(total(&greedy), 4.0 + 18.0);

        let optimal = FeatureMatcher::with_strategy(params, OptimalAssignment).run(&expected, &detected);
        assert_eq!(optimal.matches.len(), 2);
        assert_relative_eq!(total(&optimal), 8.0 + 6.0);
    }

    #[test]
    fn optimal_assignment_prefers_more_pairs_inside_the_radius() {
        let expected = [hole(0.0, 0.0), hole(20.0, 0.0)];
        let detected = [det(FeatureType::Hole, 10.0, 0.0)];
        let a = OptimalAssignment.assign(&expected, &detected, 15.0);
        assert_eq!(a.iter().flatten().count(), 1);
        let far = [det(FeatureType::Hole, 100.0, 0.0)];
        assert_eq!(OptimalAssignment.assign(&expected, &far, 15.0), vec![None, None]);
    }

    #[test]
    fn every_item_lands_in_exactly_one_bucket() {
        let expected: Vec<_> = (0..6).map(|i| hole(i as f64 * 12.0, 0.0)).collect();
        let mut detected: Vec<_> = (0..5)
            .map(|i| det(FeatureType::Hole, i as f64 * 12.0 + 1.5, 2.0))
            .collect();
        detected.push(det(FeatureType::Scratch, 0.0, 0.0));
        detected.push(det(FeatureType::Hole, 500.0, 500.0));
        for r in [
            FeatureMatcher::new(MatchParams::default()).run(&expected, &detected),
            FeatureMatcher::with_strategy(MatchParams::default(), OptimalAssignment)
                .run(&expected, &detected),
        ] {
            assert_eq!(r.matches.len() + r.missing.len(), expected.len());
            assert_eq!(r.matches.len() + r.extras.len(), detected.len());
            assert_eq!(r.matches.len(), 5);
        }
    }
}
