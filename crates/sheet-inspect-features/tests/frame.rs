use nalgebra::Point2;
use sheet_inspect_core::RgbImage;
use sheet_inspect_features::{choose_origin, FeatureDetector, FeatureType, PixelToMm};

const PLATE: [u8; 3] = [200, 200, 200];

/// Light plate on a dark table, two drilled holes and a scratch.
fn frame() -> RgbImage {
    let mut img = RgbImage::new(240, 180, [30, 30, 30]);
    for y in 20..160 {
        for x in 20..220 {
            img.set(x, y, PLATE);
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
    for y in 139..142 {
        for x in 50..170 {
            img.set(x, y, [40, 40, 40]);
        }
    }
    img
}

#[test]
fn plate_features_are_found_and_measured() {
    let img = frame();
    let det = FeatureDetector::default();
    let report = det.detect_report(&img.view());

    let sheet = report.sheet.expect("sheet outline");
    assert!((sheet.rect.x - 19.0).abs() <= 1.5, "{sheet:?}");
    assert!((sheet.rect.y - 19.0).abs() <= 1.5, "{sheet:?}");

    let conv = PixelToMm::new(0.5, choose_origin(&[], report.sheet.as_ref()));
    let mut items = report.items();
    conv.measure_all(&mut items);

    let holes: Vec<_> = items
        .iter()
        .filter(|i| i.feature_type == FeatureType::Hole)
        .collect();
    for (cx, cy, d_mm) in [(70.0f32, 60.0f32, 15.0f64), (160.0, 90.0, 20.0)] {
        let hole = holes
            .iter()
            .find(|h| (h.center_px() - Point2::new(cx, cy)).norm() < 2.0)
            .unwrap_or_else(|| panic!("no hole near ({cx}, {cy}): {holes:?}"));
        // The plate around the hole is light gray, inside the coating range.
        assert!(hole.has_alodine, "{hole:?}");
        let m = hole.measurement.expect("measured");
        assert!((m.diameter_mm.expect("diameter") - d_mm).abs() <= 1.0, "{m:?}");
        let expected = Point2::new((cx - sheet.rect.x) as f64 * 0.5, (cy - sheet.rect.y) as f64 * 0.5);
        assert!((m.position_mm - expected).norm() <= 1.0, "{m:?}");
    }
    assert!(report.count(FeatureType::AlodineHalo) >= 2);

    let scratch = items
        .iter()
        .filter(|i| i.feature_type == FeatureType::Scratch)
        .filter_map(|i| i.measurement.and_then(|m| m.length_mm).map(|l| (i, l)))
        .find(|(i, _)| (i.center_px().y - 140.0).abs() <= 2.0)
        .expect("scratch along the dark line");
    assert!((scratch.1 - 59.5).abs() <= 2.0, "{scratch:?}");
}
