use crate::io::CalibrationIoError;
use crate::solver::SolverError;

/// Why a calibration run produced no result.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("no accepted frame recorded an image size")]
    NoImageSize,
    #[error("no observation maps to enough board points ({skipped} skipped)")]
    NoUsableObservations { skipped: usize },
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("calibration solved but could not be saved: {0}")]
    Persist(#[from] CalibrationIoError),
}

impl CalibrationError {
    /// Numeric status for reporting layers that expect `-1`/`-2`/`-3`.
    pub fn code(&self) -> i32 {
        match self {
            CalibrationError::NoImageSize => -1,
            CalibrationError::NoUsableObservations { .. } => -2,
            CalibrationError::Solver(_) | CalibrationError::Persist(_) => -3,
        }
    }
}
