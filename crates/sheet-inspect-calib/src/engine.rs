//! Frame accumulation, solve and persistence.

use crate::board::CharucoBoard;
use crate::board_detector::{BoardDetector, CharucoCorner, MarkerCharucoDetector};
use crate::calibration::{self, CameraCalibration};
use crate::error::CalibrationError;
use crate::io::{load_calibration_file, save_calibration_to_json, DEFAULT_CALIBRATION_PATH};
use crate::solver::{calibrate_planar, PlanarView, SolverParams};
use nalgebra::Point2;
use sheet_inspect_core::GrayImageView;
use sheet_inspect_markers::MarkerResolver;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Frames with at most this many corners are rejected.
pub const MIN_CORNERS_EXCLUSIVE: usize = 4;

/// Observations mapping to fewer board points are left out of the solve.
pub const MIN_POINTS_PER_VIEW: usize = 4;

/// One accepted capture.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardObservation {
    pub corners: Vec<CharucoCorner>,
    /// `[width, height]` of the frame.
    pub image_size: [u32; 2],
}

/// Collects board captures, solves the camera model and keeps the latest
/// calibration both in memory and on disk.
///
/// Mutation takes `&mut self`; wrap the engine in a `Mutex` to share it.
pub struct CalibrationEngine<D: BoardDetector> {
    board: CharucoBoard,
    detector: D,
    calibration_path: PathBuf,
    solver: SolverParams,
    observations: Vec<BoardObservation>,
    image_size: Option<[u32; 2]>,
    calibration: Option<CameraCalibration>,
}

impl CalibrationEngine<MarkerCharucoDetector> {
    /// Engine using the marker-driven ChArUco detector, saving to
    /// [`DEFAULT_CALIBRATION_PATH`].
    pub fn with_marker_detector(board: CharucoBoard, resolver: MarkerResolver) -> Self {
        let detector = MarkerCharucoDetector::new(board.clone(), resolver);
        Self::new(board, detector, DEFAULT_CALIBRATION_PATH)
    }
}

impl<D: BoardDetector> CalibrationEngine<D> {
    /// Build the engine and load any calibration already stored at `calibration_path`.
    pub fn new(board: CharucoBoard, detector: D, calibration_path: impl Into<PathBuf>) -> Self {
        let mut engine = Self {
            board,
            detector,
            calibration_path: calibration_path.into(),
            solver: SolverParams::default(),
            observations: Vec::new(),
            image_size: None,
            calibration: None,
        };
        engine.load_calibration();
        engine
    }

    pub fn with_solver_params(mut self, params: SolverParams) -> Self {
        self.solver = params;
        self
    }

    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }

    pub fn calibration_path(&self) -> &Path {
        &self.calibration_path
    }

    pub fn calibration(&self) -> Option<&CameraCalibration> {
        self.calibration.as_ref()
    }

    /// Replace the in-memory calibration without touching the file.
    pub fn set_calibration(&mut self, calibration: Option<CameraCalibration>) {
        self.calibration = calibration;
    }

    pub fn observations(&self) -> &[BoardObservation] {
        &self.observations
    }

    /// Drop every buffered observation. The image size of the last
    /// accepted frame is kept.
    pub fn reset_accumulation(&mut self) {
        self.observations.clear();
        self.observations.shrink_to_fit();
    }

    /// Detect the board in `frame`; keep the observation when more than
    /// [`MIN_CORNERS_EXCLUSIVE`] corners are found.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn add_calibration_frame(&mut self, frame: &GrayImageView<'_>) -> bool {
        let corners = self.detector.detect_board(frame);
        if corners.len() <= MIN_CORNERS_EXCLUSIVE {
            log::debug!("frame rejected: {} corners", corners.len());
            return false;
        }
        let image_size = [frame.width as u32, frame.height as u32];
        log::info!(
            "frame accepted: {} corners (observation #{})",
            corners.len(),
            self.observations.len() + 1
        );
        self.observations.push(BoardObservation {
            corners,
            image_size,
        });
        self.image_size = Some(image_size);
        true
    }

    /// Map an observation's corner ids onto board points.
    fn planar_view(&self, obs: &BoardObservation) -> PlanarView {
        let mut view = PlanarView::default();
        for c in &obs.corners {
            let Some(xy) = self.board.charuco_object_xy(c.id) else {
                continue;
            };
            let (x, y) = (c.position.x as f64, c.position.y as f64);
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            view.object.push(xy);
            view.image.push(Point2::new(x, y));
        }
        view
    }

    /// Solve the camera model from every buffered observation.
    ///
    /// On success the calibration replaces the previous one on disk and
    /// then in memory, and the RMS reprojection error (px) is returned. On
    /// any failure, a failed save included, the in-memory calibration is
    /// left untouched.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn run_calibration(&mut self) -> Result<f64, CalibrationError> {
        let image_size = self.image_size.ok_or(CalibrationError::NoImageSize)?;

        let mut views = Vec::with_capacity(self.observations.len());
        let mut skipped = 0usize;
        for (i, obs) in self.observations.iter().enumerate() {
            let view = self.planar_view(obs);
            if view.object.len() < MIN_POINTS_PER_VIEW {
                log::warn!(
                    "observation {i}: {} valid board points, skipped",
                    view.object.len()
                );
                skipped += 1;
                continue;
            }
            views.push(view);
        }
        if views.is_empty() {
            return Err(CalibrationError::NoUsableObservations { skipped });
        }

        let solved = calibrate_planar(&views, image_size, &self.solver)?;
        log::info!(
            "calibration solved from {} views: rms {:.4} px, fx {:.2}, fy {:.2}",
            views.len(),
            solved.rms,
            solved.intrinsics.fx,
            solved.intrinsics.fy
        );

        let calibration = CameraCalibration {
            intrinsics: solved.intrinsics,
            distortion: solved.distortion,
            resolution: Some(image_size),
            calibrated_at: Some(chrono::Local::now().naive_local()),
        };
        save_calibration_to_json(&calibration, &self.calibration_path)?;
        self.calibration = Some(calibration);
        Ok(solved.rms)
    }

    /// Reload the calibration file; a missing or malformed file leaves the
    /// engine uncalibrated.
    pub fn load_calibration(&mut self) -> bool {
        if !self.calibration_path.exists() {
            log::debug!("no calibration at {}", self.calibration_path.display());
            self.calibration = None;
            return false;
        }
        match load_calibration_file(&self.calibration_path) {
            Ok(cal) => {
                log::info!("calibration loaded from {}", self.calibration_path.display());
                self.calibration = Some(cal);
                true
            }
            Err(err) => {
                log::warn!(
                    "ignoring calibration file {}: {err}",
                    self.calibration_path.display()
                );
                self.calibration = None;
                false
            }
        }
    }

    /// Store the current calibration at the configured path.
    pub fn save_calibration(&self) -> Result<(), crate::io::CalibrationIoError> {
        match &self.calibration {
            Some(cal) => save_calibration_to_json(cal, &self.calibration_path),
            None => Ok(()),
        }
    }

    /// Millimeters per pixel at `distance_mm`; see
    /// [`CameraCalibration::scale_factor`].
    pub fn scale_factor(&self, distance_mm: f64) -> f64 {
        calibration::scale_factor(self.calibration.as_ref(), distance_mm)
    }

    /// Camera distance from an object of known width; see
    /// [`CameraCalibration::estimate_distance`].
    pub fn estimate_distance(&self, observed_width_px: f64, real_width_mm: f64) -> f64 {
        calibration::estimate_distance(self.calibration.as_ref(), observed_width_px, real_width_mm)
    }
}

impl<D: BoardDetector + std::fmt::Debug> std::fmt::Debug for CalibrationEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationEngine")
            .field("detector", &self.detector)
            .field("calibration_path", &self.calibration_path)
            .field("observations", &self.observations.len())
            .field("image_size", &self.image_size)
            .field("calibration", &self.calibration)
            .finish()
    }
}
