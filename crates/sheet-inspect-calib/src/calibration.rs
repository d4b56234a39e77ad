//! Solved camera model and the pixel/millimeter relations built on it.

use chrono::NaiveDateTime;
use nalgebra::Point2;
use sheet_inspect_core::{CameraIntrinsics, Distortion, UndistortConfig};

/// Millimeters per pixel used when no usable calibration exists.
pub const FALLBACK_SCALE_MM_PER_PX: f64 = 0.264;

/// Camera-to-object distance (mm) reported when no usable calibration exists.
pub const FALLBACK_DISTANCE_MM: f64 = 1000.0;

/// Intrinsics, distortion and capture resolution of one calibration run.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraCalibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    /// Frame size `[width, height]` the calibration was computed for.
    pub resolution: Option<[u32; 2]>,
    pub calibrated_at: Option<NaiveDateTime>,
}

impl CameraCalibration {
    /// Finite matrix entries and a non-zero focal length.
    pub fn is_usable(&self) -> bool {
        self.intrinsics.is_valid() && self.distortion.is_finite()
    }

    /// `distance_mm / fx`, or [`FALLBACK_SCALE_MM_PER_PX`] when that is not
    /// a finite, non-zero number.
    pub fn scale_factor(&self, distance_mm: f64) -> f64 {
        let scale = distance_mm / self.intrinsics.fx;
        if self.is_usable() && scale.is_finite() && scale != 0.0 {
            scale
        } else {
            FALLBACK_SCALE_MM_PER_PX
        }
    }

    /// Pinhole distance estimate from an object of known width.
    pub fn estimate_distance(&self, observed_width_px: f64, real_width_mm: f64) -> f64 {
        let z = real_width_mm * self.intrinsics.fx / observed_width_px;
        if self.is_usable() && z.is_finite() {
            z
        } else {
            FALLBACK_DISTANCE_MM
        }
    }

    /// Remove lens distortion from a pixel position.
    pub fn undistort_point(&self, px: Point2<f64>) -> Point2<f64> {
        let k = &self.intrinsics;
        let n = k.pixel_to_normalized(px);
        let u = self.distortion.undistort_normalized(n, UndistortConfig::default());
        k.normalized_to_pixel(u)
    }

    /// Apply lens distortion to an ideal pixel position.
    pub fn distort_point(&self, px: Point2<f64>) -> Point2<f64> {
        let k = &self.intrinsics;
        let n = k.pixel_to_normalized(px);
        k.normalized_to_pixel(self.distortion.distort_normalized(n))
    }
}

/// Scale for an optional calibration, falling back when absent.
pub fn scale_factor(calibration: Option<&CameraCalibration>, distance_mm: f64) -> f64 {
    calibration.map_or(FALLBACK_SCALE_MM_PER_PX, |c| c.scale_factor(distance_mm))
}

/// Distance estimate for an optional calibration, falling back when absent.
pub fn estimate_distance(
    calibration: Option<&CameraCalibration>,
    observed_width_px: f64,
    real_width_mm: f64,
) -> f64 {
    calibration.map_or(FALLBACK_DISTANCE_MM, |c| {
        c.estimate_distance(observed_width_px, real_width_mm)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn sample(fx: f64) -> CameraCalibration {
        CameraCalibration {
            intrinsics: CameraIntrinsics {
                fx,
                fy: fx,
                cx: 320.0,
                cy: 240.0,
            },
            distortion: Distortion::from_array([-0.12, 0.03, 0.001, -0.0005, 0.0]),
            resolution: Some([640, 480]),
            calibrated_at: NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(12, 0, 0)),
        }
    }

    #[test]
    fn fallback_scale_for_degenerate_focal() {
        for fx in [0.0, f64::NAN, f64::INFINITY] {
            let cal = sample(fx);
            for d in [1.0, 250.0, 1000.0] {
                assert_eq!(cal.scale_factor(d), FALLBACK_SCALE_MM_PER_PX);
            }
        }
        assert_eq!(scale_factor(None, 500.0), FALLBACK_SCALE_MM_PER_PX);
    }

    #[test]
    fn scale_grows_with_distance() {
        let cal = sample(800.0);
        assert_relative_eq!(cal.scale_factor(400.0), 0.5);
        assert!(cal.scale_factor(300.0) < cal.scale_factor(301.0));
    }

    #[test]
    fn distance_estimate_and_fallback() {
        let cal = sample(800.0);
        assert_relative_eq!(cal.estimate_distance(40.0, 20.0), 400.0);
        assert_eq!(cal.estimate_distance(0.0, 20.0), FALLBACK_DISTANCE_MM);
        assert_eq!(estimate_distance(None, 40.0, 20.0), FALLBACK_DISTANCE_MM);
    }

    #[test]
    fn undistort_inverts_distort() {
        let cal = sample(800.0);
        let p = Point2::new(600.0, 50.0);
        let back = cal.undistort_point(cal.distort_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }
}
