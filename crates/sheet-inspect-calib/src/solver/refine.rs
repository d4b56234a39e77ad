//! Levenberg–Marquardt over intrinsics, distortion and view poses.

use super::zhang::InitialEstimate;
use super::{project_point, PlanarCalibration, PlanarView, SolverError, SolverParams, ViewPose};
use nalgebra::{DMatrix, DVector, Vector3};
use sheet_inspect_core::{CameraIntrinsics, Distortion};

const N_CAMERA: usize = 9; // fx fy cx cy k1 k2 p1 p2 k3
const N_POSE: usize = 6;

/// Flat parameter vector with a mask of free entries.
struct Problem<'a> {
    views: &'a [PlanarView],
    free: Vec<bool>,
    n_points: usize,
}

fn pack(k: &CameraIntrinsics, d: &Distortion, poses: &[ViewPose]) -> DVector<f64> {
    let mut p = DVector::zeros(N_CAMERA + N_POSE * poses.len());
    p[0] = k.fx;
    p[1] = k.fy;
    p[2] = k.cx;
    p[3] = k.cy;
    for (i, c) in d.to_array().into_iter().enumerate() {
        p[4 + i] = c;
    }
    for (v, pose) in poses.iter().enumerate() {
        let o = N_CAMERA + N_POSE * v;
        for a in 0..3 {
            p[o + a] = pose.rvec[a];
            p[o + 3 + a] = pose.tvec[a];
        }
    }
    p
}

fn unpack_camera(p: &DVector<f64>) -> (CameraIntrinsics, Distortion) {
    (
        CameraIntrinsics {
            fx: p[0],
            fy: p[1],
            cx: p[2],
            cy: p[3],
        },
        Distortion::from_array([p[4], p[5], p[6], p[7], p[8]]),
    )
}

fn unpack_pose(p: &DVector<f64>, view: usize) -> ViewPose {
    let o = N_CAMERA + N_POSE * view;
    ViewPose {
        rvec: Vector3::new(p[o], p[o + 1], p[o + 2]),
        tvec: Vector3::new(p[o + 3], p[o + 4], p[o + 5]),
    }
}

impl Problem<'_> {
    fn residuals(&self, p: &DVector<f64>) -> Option<DVector<f64>> {
        let (k, d) = unpack_camera(p);
        let mut r = DVector::zeros(2 * self.n_points);
        let mut row = 0;
        for (vi, view) in self.views.iter().enumerate() {
            let pose = unpack_pose(p, vi);
            for (obj, img) in view.object.iter().zip(&view.image) {
                let q = project_point(&k, &d, &pose, *obj)?;
                r[row] = q.x - img.x;
                r[row + 1] = q.y - img.y;
                row += 2;
            }
        }
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    /// Forward-difference Jacobian; fixed parameters get zero columns.
    fn jacobian(&self, p: &DVector<f64>, r0: &DVector<f64>) -> Option<DMatrix<f64>> {
        let mut j = DMatrix::zeros(r0.len(), p.len());
        let mut q = p.clone();
        for c in 0..p.len() {
            if !self.free[c] {
                continue;
            }
            let step = 1e-7 * (1.0 + p[c].abs());
            q[c] = p[c] + step;
            let r = self.residuals(&q)?;
            q[c] = p[c];
            j.set_column(c, &((r - r0) / step));
        }
        Some(j)
    }
}

pub(super) fn refine(
    views: &[PlanarView],
    init: &InitialEstimate,
    params: &SolverParams,
) -> Result<PlanarCalibration, SolverError> {
    let n_points = views
        .iter()
        .map(|v| v.object.len().min(v.image.len()))
        .sum();

    let mut p = pack(&init.intrinsics, &Distortion::default(), &init.poses);
    let mut free = vec![true; p.len()];
    if !init.full {
        // Principal point and distortion stay at their pinned values.
        free[2..N_CAMERA].iter_mut().for_each(|f| *f = false);
    }
    let problem = Problem {
        views,
        free,
        n_points,
    };

    let mut r = problem.residuals(&p).ok_or(SolverError::NonFinite)?;
    let mut cost = r.norm_squared();
    let mut lambda = params.initial_lambda;
    let mut iterations = 0;

    while iterations < params.max_iters && cost > 1e-24 {
        iterations += 1;
        let j = problem.jacobian(&p, &r).ok_or(SolverError::NonFinite)?;
        let jt = j.transpose();
        let a = &jt * &j;
        let g = &jt * &r;

        let mut improved = false;
        while lambda < 1e12 {
            let mut m = a.clone();
            for c in 0..p.len() {
                if problem.free[c] {
                    m[(c, c)] += lambda * a[(c, c)].max(1e-12);
                } else {
                    m[(c, c)] = 1.0;
                }
            }
            let Some(delta) = solve(m, -&g) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = &p + &delta;
            match problem.residuals(&candidate) {
                Some(rc) if rc.norm_squared() < cost => {
                    let new_cost = rc.norm_squared();
                    let rel = (cost - new_cost) / cost.max(1e-300);
                    p = candidate;
                    r = rc;
                    cost = new_cost;
                    lambda = (lambda * 0.1).max(1e-12);
                    improved = rel > params.cost_tol;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }
        if !improved {
            break;
        }
    }

    let (intrinsics, distortion) = unpack_camera(&p);
    let poses = (0..views.len()).map(|v| unpack_pose(&p, v)).collect();
    let rms = (cost / n_points.max(1) as f64).sqrt();
    log::debug!("refine: {iterations} iterations, rms {rms:.6} px");

    Ok(PlanarCalibration {
        intrinsics,
        distortion,
        poses,
        rms,
        iterations,
    })
}

fn solve(m: DMatrix<f64>, rhs: DVector<f64>) -> Option<DVector<f64>> {
    if let Some(ch) = m.clone().cholesky() {
        return Some(ch.solve(&rhs));
    }
    m.lu().solve(&rhs)
}
