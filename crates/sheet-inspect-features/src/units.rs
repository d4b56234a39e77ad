//! Pixel → millimeter conversion.

use crate::feature::{DetectionItem, Measurement, PixelGeometry};
use crate::sheet::SheetOutline;
use nalgebra::Point2;
use sheet_inspect_core::{CameraIntrinsics, Distortion, UndistortConfig};
use sheet_inspect_markers::FiducialMarker;

/// Camera model used to undo lens distortion before scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Undistortion {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
}

impl Undistortion {
    pub fn point(&self, p: Point2<f64>) -> Point2<f64> {
        let n = self.intrinsics.pixel_to_normalized(p);
        let u = self
            .distortion
            .undistort_normalized(n, UndistortConfig::default());
        self.intrinsics.normalized_to_pixel(u)
    }
}

/// Uniform scale about an origin, with optional undistortion of positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelToMm {
    pub scale_mm_per_px: f64,
    pub origin_px: Point2<f64>,
    pub undistort: Option<Undistortion>,
}

impl PixelToMm {
    pub fn new(scale_mm_per_px: f64, origin_px: Point2<f64>) -> Self {
        Self {
            scale_mm_per_px,
            origin_px,
            undistort: None,
        }
    }

    pub fn with_undistortion(mut self, intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        self.undistort = Some(Undistortion {
            intrinsics,
            distortion,
        });
        self
    }

    fn correct(&self, p: Point2<f64>) -> Point2<f64> {
        match &self.undistort {
            Some(u) => u.point(p),
            None => p,
        }
    }

    /// Position in mm relative to the origin (both undistorted first).
    pub fn point_to_mm(&self, p: Point2<f32>) -> Point2<f64> {
        let p = self.correct(Point2::new(p.x as f64, p.y as f64));
        let o = self.correct(self.origin_px);
        Point2::from((p - o) * self.scale_mm_per_px)
    }

    pub fn length_to_mm(&self, length_px: f32) -> f64 {
        length_px as f64 * self.scale_mm_per_px
    }

    pub fn measure(&self, item: &DetectionItem) -> Measurement {
        let g = &item.pixel_geometry;
        let mut m = Measurement::at(self.point_to_mm(g.center()));
        match g {
            PixelGeometry::Circle(c) => m.diameter_mm = Some(self.length_to_mm(2.0 * c.radius)),
            PixelGeometry::Box(r) => {
                m.diameter_mm = g.diameter_px().map(|d| self.length_to_mm(d));
                m.width_mm = Some(self.length_to_mm(r.width));
                m.height_mm = Some(self.length_to_mm(r.height));
            }
            PixelGeometry::Line(l) => m.length_mm = Some(self.length_to_mm(l.length())),
        }
        m
    }

    pub fn measure_all(&self, items: &mut [DetectionItem]) {
        for item in items {
            item.measurement = Some(self.measure(item));
        }
    }
}

/// Coordinate origin: the first marker's corner 0, else the sheet's
/// top-left corner, else the image origin.
pub fn choose_origin(markers: &[FiducialMarker], sheet: Option<&SheetOutline>) -> Point2<f64> {
    if let Some(m) = markers.first() {
        let c = m.corners[0];
        return Point2::new(c.x as f64, c.y as f64);
    }
    if let Some(s) = sheet {
        return Point2::new(s.rect.x as f64, s.rect.y as f64);
    }
    Point2::origin()
}
