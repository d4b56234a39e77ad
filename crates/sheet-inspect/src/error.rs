use sheet_inspect_calib::{CalibrationError, CalibrationIoError, CharucoBoardError};
use sheet_inspect_features::FeatureParamsError;
use sheet_inspect_match::SpecError;

/// Errors produced by the facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    CalibrationIo(#[from] CalibrationIoError),

    #[error(transparent)]
    Board(#[from] CharucoBoardError),

    #[error(transparent)]
    Specification(#[from] SpecError),

    #[error(transparent)]
    FeatureParams(#[from] FeatureParamsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}
