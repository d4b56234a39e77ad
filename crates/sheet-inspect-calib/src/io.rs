//! JSON persistence of the camera calibration.
//!
//! File layout:
//!
//! ```json
//! {
//!   "cameraMatrix": [fx, 0, cx, 0, fy, cy, 0, 0, 1],
//!   "distortionCoeffs": [k1, k2, p1, p2, k3],
//!   "calibrationDate": "2024-03-01 12:00:00",
//!   "resolution": [1920, 1080]
//! }
//! ```
//!
//! `calibrationDate` and `resolution` are optional; a date that does not
//! parse is dropped with a warning.

use crate::calibration::CameraCalibration;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{CameraIntrinsics, Distortion};
use std::{fs, path::Path};

/// Default location of the calibration file, relative to the working directory.
pub const DEFAULT_CALIBRATION_PATH: &str = "config/calibration.json";

/// `calibrationDate` format.
pub const CALIBRATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("calibration file holds a non-finite camera matrix")]
    NonFinite,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalibrationFile {
    camera_matrix: [f64; 9],
    distortion_coeffs: [f64; 5],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calibration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<[u32; 2]>,
}

impl From<&CameraCalibration> for CalibrationFile {
    fn from(cal: &CameraCalibration) -> Self {
        Self {
            camera_matrix: cal.intrinsics.to_row_major(),
            distortion_coeffs: cal.distortion.to_array(),
            calibration_date: cal
                .calibrated_at
                .map(|at| at.format(CALIBRATION_DATE_FORMAT).to_string()),
            resolution: cal.resolution,
        }
    }
}

impl TryFrom<CalibrationFile> for CameraCalibration {
    type Error = CalibrationIoError;

    fn try_from(file: CalibrationFile) -> Result<Self, Self::Error> {
        if file.camera_matrix.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationIoError::NonFinite);
        }
        let calibrated_at = file.calibration_date.as_deref().and_then(|raw| {
            NaiveDateTime::parse_from_str(raw, CALIBRATION_DATE_FORMAT)
                .map_err(|e| log::warn!("ignoring calibrationDate `{raw}`: {e}"))
                .ok()
        });
        Ok(Self {
            intrinsics: CameraIntrinsics::from_row_major(&file.camera_matrix),
            distortion: Distortion::from_array(file.distortion_coeffs),
            resolution: file.resolution,
            calibrated_at,
        })
    }
}

/// Serialize a calibration to its JSON text.
pub fn calibration_to_json(cal: &CameraCalibration) -> Result<String, CalibrationIoError> {
    Ok(serde_json::to_string_pretty(&CalibrationFile::from(cal))?)
}

/// Parse a calibration from JSON text.
pub fn calibration_from_json(raw: &str) -> Result<CameraCalibration, CalibrationIoError> {
    let file: CalibrationFile = serde_json::from_str(raw)?;
    file.try_into()
}

/// Write the calibration to `path`, creating parent directories; replaces
/// any previous file.
pub fn save_calibration_to_json(
    cal: &CameraCalibration,
    path: impl AsRef<Path>,
) -> Result<(), CalibrationIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, calibration_to_json(cal)?)?;
    log::info!("calibration saved to {}", path.display());
    Ok(())
}

/// Read a calibration file.
pub fn load_calibration_file(path: impl AsRef<Path>) -> Result<CameraCalibration, CalibrationIoError> {
    let raw = fs::read_to_string(path)?;
    calibration_from_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cameraMatrix": [812.5, 0.0, 640.0, 0.0, 810.0, 360.0, 0.0, 0.0, 1.0],
        "distortionCoeffs": [-0.1, 0.02, 0.0, 0.0, 0.001],
        "calibrationDate": "2024-05-17 08:30:00",
        "resolution": [1280, 720]
    }"#;

    #[test]
    fn parses_documented_layout() {
        let cal = calibration_from_json(SAMPLE).expect("parse");
        assert_eq!(cal.intrinsics.fx, 812.5);
        assert_eq!(cal.intrinsics.cy, 360.0);
        assert_eq!(cal.distortion.k3, 0.001);
        assert_eq!(cal.resolution, Some([1280, 720]));
        assert_eq!(
            cal.calibrated_at
                .map(|at| at.format(CALIBRATION_DATE_FORMAT).to_string())
                .as_deref(),
            Some("2024-05-17 08:30:00")
        );
    }

    #[test]
    fn save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config").join("calibration.json");
        let cal = calibration_from_json(SAMPLE).expect("parse");

        save_calibration_to_json(&cal, &path).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"cameraMatrix\""));
        assert!(raw.contains("\"calibrationDate\": \"2024-05-17 08:30:00\""));
        assert_eq!(load_calibration_file(&path).expect("load"), cal);
    }

    #[test]
    fn date_and_resolution_are_optional() {
        let minimal = r#"{
            "cameraMatrix": [812.5, 0.0, 640.0, 0.0, 810.0, 360.0, 0.0, 0.0, 1.0],
            "distortionCoeffs": [0.0, 0.0, 0.0, 0.0, 0.0]
        }"#;
        let cal = calibration_from_json(minimal).expect("parse");
        assert_eq!(cal.intrinsics.fx, 812.5);
        assert_eq!(cal.resolution, None);
        assert_eq!(cal.calibrated_at, None);
        assert!(!calibration_to_json(&cal).expect("json").contains("calibrationDate"));

        let dated = r#"{
            "cameraMatrix": [812.5, 0.0, 640.0, 0.0, 810.0, 360.0, 0.0, 0.0, 1.0],
            "distortionCoeffs": [0.0, 0.0, 0.0, 0.0, 0.0],
            "calibrationDate": "2024-05-17 08:30:00"
        }"#;
        let cal = calibration_from_json(dated).expect("parse");
        assert!(cal.calibrated_at.is_some());
        assert_eq!(cal.resolution, None);
    }

    #[test]
    fn unparsable_dates_are_dropped_and_short_arrays_rejected() {
        let bad_date = SAMPLE.replace("2024-05-17 08:30:00", "17/05/2024");
        let cal = calibration_from_json(&bad_date).expect("parse");
        assert_eq!(cal.calibrated_at, None);
        assert_eq!(cal.resolution, Some([1280, 720]));
        let short = SAMPLE.replace("[-0.1, 0.02, 0.0, 0.0, 0.001]", "[-0.1]");
        assert!(matches!(
            calibration_from_json(&short),
            Err(CalibrationIoError::Json(_))
        ));
    }
}
