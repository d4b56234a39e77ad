//! Planar (Zhang) camera calibration with Levenberg–Marquardt refinement.
//!
//! The solve runs in three stages:
//!
//! 1. per-view board → image homographies and a closed-form pinhole
//!    estimate ([`zhang`]),
//! 2. per-view poses from `K⁻¹ H`,
//! 3. joint refinement of intrinsics, distortion and poses ([`refine`]).
//!
//! With fewer than [`MIN_VIEWS_FULL`] views the principal point is pinned
//! to the image center and distortion to zero; only focal lengths and
//! poses are estimated.

mod refine;
mod zhang;

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{CameraIntrinsics, Distortion};

/// Views needed to constrain all pinhole parameters.
pub const MIN_VIEWS_FULL: usize = 3;

/// Numerical failures of the calibration solve.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("no views to calibrate from")]
    NoViews,
    #[error("view {view} has {points} correspondences (need >= 4)")]
    TooFewPoints { view: usize, points: usize },
    #[error("homography estimation failed for view {0}")]
    Homography(usize),
    #[error("degenerate calibration system: {0}")]
    Degenerate(&'static str),
    #[error("normal equations are singular")]
    Singular,
    #[error("solver produced non-finite parameters")]
    NonFinite,
}

/// Board-plane (mm, z = 0) ↔ pixel correspondences of one view.
#[derive(Clone, Debug, Default)]
pub struct PlanarView {
    pub object: Vec<Point2<f64>>,
    pub image: Vec<Point2<f64>>,
}

/// Rigid board → camera transform: Rodrigues vector and translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

/// Refinement controls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub max_iters: usize,
    /// Stop once the relative cost decrease falls below this.
    pub cost_tol: f64,
    pub initial_lambda: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iters: 100,
            cost_tol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

/// Result of a successful solve.
#[derive(Clone, Debug)]
pub struct PlanarCalibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    pub poses: Vec<ViewPose>,
    /// RMS reprojection error in pixels over all points of all views.
    pub rms: f64,
    pub iterations: usize,
}

/// Calibrate a camera from planar board views taken at `image_size`.
pub fn calibrate_planar(
    views: &[PlanarView],
    image_size: [u32; 2],
    params: &SolverParams,
) -> Result<PlanarCalibration, SolverError> {
    if views.is_empty() {
        return Err(SolverError::NoViews);
    }
    if image_size.contains(&0) {
        return Err(SolverError::Degenerate("empty image size"));
    }
    for (view, v) in views.iter().enumerate() {
        let points = v.object.len().min(v.image.len());
        if points < 4 {
            return Err(SolverError::TooFewPoints { view, points });
        }
    }

    let init = zhang::initial_estimate(views, image_size)?;
    log::debug!(
        "calibrate_planar: init fx={:.2} fy={:.2} cx={:.2} cy={:.2} ({} views, full={})",
        init.intrinsics.fx,
        init.intrinsics.fy,
        init.intrinsics.cx,
        init.intrinsics.cy,
        views.len(),
        init.full
    );

    let out = refine::refine(views, &init, params)?;
    let finite = out.intrinsics.is_valid()
        && out.distortion.is_finite()
        && out.rms.is_finite()
        && out
            .poses
            .iter()
            .all(|p| p.rvec.iter().chain(p.tvec.iter()).all(|v| v.is_finite()));
    if !finite {
        return Err(SolverError::NonFinite);
    }
    Ok(out)
}

/// Project a board point through a pose and camera model.
pub fn project_point(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &ViewPose,
    object: Point2<f64>,
) -> Option<Point2<f64>> {
    let r = nalgebra::Rotation3::from_scaled_axis(pose.rvec);
    let pc = r * Vector3::new(object.x, object.y, 0.0) + pose.tvec;
    if pc.z.abs() < 1e-12 {
        return None;
    }
    let n = Point2::new(pc.x / pc.z, pc.y / pc.z);
    Some(intrinsics.normalized_to_pixel(distortion.distort_normalized(n)))
}
