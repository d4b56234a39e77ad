//! Detector output shared with the matcher.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{Circle, LineSegment, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    Sheet,
    Hole,
    Countersink,
    Scratch,
    Deformation,
    AlodineHalo,
}

impl FeatureType {
    pub const ALL: [FeatureType; 6] = [
        FeatureType::Sheet,
        FeatureType::Hole,
        FeatureType::Countersink,
        FeatureType::Scratch,
        FeatureType::Deformation,
        FeatureType::AlodineHalo,
    ];

    /// Canonical upper-case label.
    pub fn label(self) -> &'static str {
        match self {
            FeatureType::Sheet => "SHEET",
            FeatureType::Hole => "HOLE",
            FeatureType::Countersink => "COUNTERSINK",
            FeatureType::Scratch => "SCRATCH",
            FeatureType::Deformation => "DEFORMATION",
            FeatureType::AlodineHalo => "ALODINE_HALO",
        }
    }

    /// Case-insensitive lookup accepting the detector model's Spanish class
    /// names as aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase();
        let ty = match l.as_str() {
            "sheet" | "lamina" | "lámina" => FeatureType::Sheet,
            "hole" | "agujero" => FeatureType::Hole,
            "countersink" | "avellanado" => FeatureType::Countersink,
            "scratch" | "rayadura" => FeatureType::Scratch,
            "deformation" | "deformacion" | "deformación" => FeatureType::Deformation,
            "alodine_halo" | "alodine" | "halo_alodine" | "alodine_ring" => {
                FeatureType::AlodineHalo
            }
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a feature sits in the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PixelGeometry {
    Circle(Circle),
    Box(Rect),
    Line(LineSegment),
}

impl PixelGeometry {
    pub fn center(&self) -> Point2<f32> {
        match self {
            PixelGeometry::Circle(c) => c.center,
            PixelGeometry::Box(r) => r.center(),
            PixelGeometry::Line(l) => Point2::from((l.start.coords + l.end.coords) * 0.5),
        }
    }

    /// Circle diameter; for a box, the mean of its sides.
    pub fn diameter_px(&self) -> Option<f32> {
        match self {
            PixelGeometry::Circle(c) => Some(2.0 * c.radius),
            PixelGeometry::Box(r) => Some(0.5 * (r.width + r.height)),
            PixelGeometry::Line(_) => None,
        }
    }

    pub fn bounding(&self) -> Rect {
        match self {
            PixelGeometry::Circle(c) => Rect::around_circle(c.center, c.radius),
            PixelGeometry::Box(r) => *r,
            PixelGeometry::Line(l) => {
                Rect::bounding(&[l.start, l.end]).unwrap_or(Rect::new(l.start.x, l.start.y, 0.0, 0.0))
            }
        }
    }
}

/// Physical measurement in millimeters, relative to the chosen origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub position_mm: Point2<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_mm: Option<f64>,
}

impl Measurement {
    pub fn at(position_mm: Point2<f64>) -> Self {
        Self {
            position_mm,
            diameter_mm: None,
            length_mm: None,
            width_mm: None,
            height_mm: None,
        }
    }
}

/// One detected feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionItem {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub pixel_geometry: PixelGeometry,
    pub confidence: f32,
    /// Alodine halo found around this hole.
    #[serde(default)]
    pub has_alodine: bool,
    /// Filled in by [`crate::PixelToMm::measure_all`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
}

impl DetectionItem {
    pub fn new(feature_type: FeatureType, pixel_geometry: PixelGeometry, confidence: f32) -> Self {
        Self {
            feature_type,
            pixel_geometry,
            confidence,
            has_alodine: false,
            measurement: None,
        }
    }

    pub fn with_alodine(mut self, has_alodine: bool) -> Self {
        self.has_alodine = has_alodine;
        self
    }

    pub fn center_px(&self) -> Point2<f32> {
        self.pixel_geometry.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_aliases() {
        for ty in FeatureType::ALL {
            assert_eq!(FeatureType::from_label(ty.label()), Some(ty));
        }
        assert_eq!(FeatureType::from_label("Agujero"), Some(FeatureType::Hole));
        assert_eq!(FeatureType::from_label(" AVELLANADO "), Some(FeatureType::Countersink));
        assert_eq!(FeatureType::from_label("hole"), Some(FeatureType::Hole));
        assert_eq!(FeatureType::from_label("rivet"), None);
    }

    #[test]
    fn json_shape() {
        let item = DetectionItem::new(
            FeatureType::AlodineHalo,
            PixelGeometry::Circle(Circle {
                center: Point2::new(3.0, 4.0),
                radius: 2.0,
            }),
            0.9,
        );
        let v = serde_json::to_value(&item).expect("json");
        assert_eq!(v["type"], "ALODINE_HALO");
        assert_eq!(v["pixelGeometry"]["kind"], "circle");
        assert_eq!(v["hasAlodine"], false);
        assert!(v.get("measurement").is_none());
        let back: DetectionItem = serde_json::from_value(v).expect("parse");
        assert_eq!(back, item);
    }

    #[test]
    fn geometry_centers() {
        let line = PixelGeometry::Line(LineSegment {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 4.0),
        });
        assert_eq!(line.center(), Point2::new(5.0, 2.0));
        assert_eq!(line.diameter_px(), None);
        let b = PixelGeometry::Box(Rect::new(10.0, 10.0, 4.0, 6.0));
        assert_eq!(b.center(), Point2::new(12.0, 13.0));
        assert_eq!(b.diameter_px(), Some(5.0));
    }
}
