//! Camera calibration from ChArUco board captures.
//!
//! [`CalibrationEngine`] buffers accepted board observations, solves the
//! pinhole + Brown–Conrady model ([`solver`]) and persists the result as
//! JSON ([`io`]). The solved [`CameraCalibration`] converts pixel lengths to
//! millimeters at a known working distance.
//!
//! Board corners come from a [`BoardDetector`]; the default
//! [`MarkerCharucoDetector`] predicts them from decoded markers.

mod board;
mod board_detector;
mod calibration;
mod engine;
mod error;
pub mod io;
pub mod solver;

pub use board::{CharucoBoard, CharucoBoardError, CharucoBoardSpec};
pub use board_detector::{BoardDetector, CharucoCorner, MarkerCharucoDetector};
pub use calibration::{
    estimate_distance, scale_factor, CameraCalibration, FALLBACK_DISTANCE_MM,
    FALLBACK_SCALE_MM_PER_PX,
};
pub use engine::{BoardObservation, CalibrationEngine, MIN_CORNERS_EXCLUSIVE, MIN_POINTS_PER_VIEW};
pub use error::CalibrationError;
pub use io::{save_calibration_to_json, CalibrationIoError, DEFAULT_CALIBRATION_PATH};
