use sheet_inspect_features::FeatureType;
use sheet_inspect_match::{
    verdicts, DetectedFeature, DetectionStatus, FeatureMatcher, MatchParams, MatchStatus,
    OptimalAssignment, Specification, ValidationPolicy,
};

const SPEC: &str = r#"{
    "name": "panel-a",
    "sheetType": "AL-2024",
    "positionToleranceMm": 2.0,
    "features": [
        {"type": "HOLE", "positionX_mm": 100.0, "positionY_mm": 100.0, "diameter_mm": 10.0},
        {"type": "HOLE", "positionX_mm": 40.0, "positionY_mm": 100.0, "diameter_mm": 6.0,
         "tolerance_mm": 0.2, "requireAlodine": true},
        {"type": "COUNTERSINK", "positionX_mm": 70.0, "positionY_mm": 20.0, "diameter_mm": 9.0,
         "requireCountersink": true},
        {"face": "BACK", "type": "HOLE", "positionX_mm": 5.0, "positionY_mm": 5.0, "diameter_mm": 4.0}
    ]
}"#;

#[test]
fn front_face_inspection() {
    let spec = Specification::from_json_str(SPEC).expect("spec");
    let expected = spec.features_on(sheet_inspect_match::Face::Front);
    assert_eq!(expected.len(), 3);

    let detected = vec![
        DetectedFeature::new(FeatureType::Hole, 102.0, 101.0, 10.3),
        DetectedFeature::new(FeatureType::Hole, 41.0, 100.0, 6.1),
        DetectedFeature::new(FeatureType::Countersink, 73.0, 20.0, 9.1),
        DetectedFeature::new(FeatureType::Scratch, 10.0, 10.0, 0.0),
    ];
    let params = MatchParams {
        position_tolerance_mm: spec.position_tolerance_mm,
        ..MatchParams::default()
    };
    let policy = ValidationPolicy::default();
    for result in [
        FeatureMatcher::new(params).run(&expected, &detected),
        FeatureMatcher::with_strategy(params, OptimalAssignment).run(&expected, &detected),
    ] {
        let v = verdicts(&result, &policy);
        assert_eq!(v.len(), 4);
        // 2.236 mm off with a 2 mm position tolerance.
        assert_eq!(v[0].status, MatchStatus::PositionError);
        assert_eq!(v[0].detection_status, DetectionStatus::Ok);
        // In place, but the coating is missing.
        assert_eq!(v[1].status, MatchStatus::MatchOk);
        assert_eq!(v[1].detection_status, DetectionStatus::NotAccepted);
        assert_eq!(v[2].status, MatchStatus::PositionError);
        assert_eq!(v[3].status, MatchStatus::Extra);
        assert!(v.iter().all(|v| !v.is_accepted()));

        let json = serde_json::to_value(&v[0]).expect("json");
        assert_eq!(json["status"], "POSITION_ERROR");
        assert_eq!(json["detectionStatus"], "OK");
    }
}
