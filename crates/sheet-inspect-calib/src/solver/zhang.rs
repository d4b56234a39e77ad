//! Closed-form initialization: homographies, `V b = 0`, poses from `K⁻¹ H`.

use super::{PlanarView, SolverError, ViewPose, MIN_VIEWS_FULL};
use nalgebra::{DMatrix, Matrix3, Point2, Rotation3, Vector3};
use sheet_inspect_core::{estimate_homography, CameraIntrinsics};

/// Starting point for the refinement.
#[derive(Clone, Debug)]
pub(super) struct InitialEstimate {
    pub intrinsics: CameraIntrinsics,
    pub poses: Vec<ViewPose>,
    /// `false` when the principal point is pinned to the image center.
    pub full: bool,
}

/// Pixel → conditioned image coordinates (center at 0, unit ≈ frame size).
fn conditioning(image_size: [u32; 2]) -> Matrix3<f64> {
    let (w, h) = (image_size[0] as f64, image_size[1] as f64);
    let s = 1.0 / w.max(h).max(1.0);
    Matrix3::new(s, 0.0, -s * 0.5 * w, 0.0, s, -s * 0.5 * h, 0.0, 0.0, 1.0)
}

pub(super) fn initial_estimate(
    views: &[PlanarView],
    image_size: [u32; 2],
) -> Result<InitialEstimate, SolverError> {
    let n = conditioning(image_size);
    let n_inv = n.try_inverse().ok_or(SolverError::Degenerate("conditioning"))?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let img: Vec<Point2<f64>> = v
                .image
                .iter()
                .map(|p| {
                    let q = n * Vector3::new(p.x, p.y, 1.0);
                    Point2::new(q.x / q.z, q.y / q.z)
                })
                .collect();
            let h = estimate_homography(&v.object, &img).ok_or(SolverError::Homography(i))?;
            let m = h.h;
            let norm = m.norm();
            if !norm.is_finite() || norm < 1e-15 {
                return Err(SolverError::Homography(i));
            }
            Ok(m / norm)
        })
        .collect::<Result<Vec<Matrix3<f64>>, SolverError>>()?;

    let (k_cond, full) = if homographies.len() >= MIN_VIEWS_FULL {
        match intrinsics_from_homographies(&homographies) {
            Ok(k) => (k, true),
            Err(err) => {
                log::warn!("closed-form intrinsics failed ({err}); pinning principal point");
                (focal_only_from_homographies(&homographies)?, false)
            }
        }
    } else {
        (focal_only_from_homographies(&homographies)?, false)
    };

    let k_cond_inv = k_cond
        .try_inverse()
        .ok_or(SolverError::Degenerate("singular camera matrix"))?;
    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&k_cond_inv, h))
        .collect::<Result<Vec<_>, _>>()?;

    let mut intrinsics = CameraIntrinsics::from_matrix(&(n_inv * k_cond));
    if !full {
        // Exact center, independent of conditioning round-off.
        intrinsics.cx = 0.5 * image_size[0] as f64;
        intrinsics.cy = 0.5 * image_size[1] as f64;
    }
    if !intrinsics.is_valid() {
        return Err(SolverError::NonFinite);
    }

    Ok(InitialEstimate {
        intrinsics,
        poses,
        full,
    })
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    [
        h[(0, i)] * h[(0, j)],
        h[(0, i)] * h[(1, j)] + h[(1, i)] * h[(0, j)],
        h[(1, i)] * h[(1, j)],
        h[(2, i)] * h[(0, j)] + h[(0, i)] * h[(2, j)],
        h[(2, i)] * h[(1, j)] + h[(1, i)] * h[(2, j)],
        h[(2, i)] * h[(2, j)],
    ]
}

/// Full pinhole (zero skew) from `>= 3` homographies.
fn intrinsics_from_homographies(hs: &[Matrix3<f64>]) -> Result<Matrix3<f64>, SolverError> {
    let rows = (2 * hs.len()).max(6);
    let mut v = DMatrix::<f64>::zeros(rows, 6);
    for (i, h) in hs.iter().enumerate() {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        for j in 0..6 {
            v[(2 * i, j)] = v12[j];
            v[(2 * i + 1, j)] = v11[j] - v22[j];
        }
    }

    let svd = v.svd(false, true);
    let vt = svd.v_t.ok_or(SolverError::Degenerate("svd"))?;
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(SolverError::Degenerate("svd"))?;
    let mut b: Vec<f64> = vt.row(idx).iter().copied().collect();

    // The null vector's sign is arbitrary; B is positive definite.
    if b[0] < 0.0 {
        b.iter_mut().for_each(|x| *x = -*x);
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() < 1e-300 || b11.abs() < 1e-300 {
        return Err(SolverError::Degenerate("B is singular"));
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return Err(SolverError::Degenerate("B is not positive definite"));
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    // Skew forced to zero.
    let u0 = -b13 * alpha * alpha / lambda;

    let k = Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    if k.iter().all(|x| x.is_finite()) {
        Ok(k)
    } else {
        Err(SolverError::NonFinite)
    }
}

/// Focal lengths only, principal point at the (conditioned) origin.
///
/// With `B = diag(a, b, 1)` each view gives two linear equations in
/// `a = 1/fx²`, `b = 1/fy²`. When those do not yield positive values the
/// pixels are assumed square (`a = b`).
fn focal_only_from_homographies(hs: &[Matrix3<f64>]) -> Result<Matrix3<f64>, SolverError> {
    let mut rows: Vec<([f64; 2], f64)> = Vec::with_capacity(2 * hs.len());
    for h in hs {
        rows.push((
            [h[(0, 0)] * h[(0, 1)], h[(1, 0)] * h[(1, 1)]],
            -h[(2, 0)] * h[(2, 1)],
        ));
        rows.push((
            [
                h[(0, 0)] * h[(0, 0)] - h[(0, 1)] * h[(0, 1)],
                h[(1, 0)] * h[(1, 0)] - h[(1, 1)] * h[(1, 1)],
            ],
            -(h[(2, 0)] * h[(2, 0)] - h[(2, 1)] * h[(2, 1)]),
        ));
    }

    let (mut s00, mut s01, mut s11, mut r0, mut r1) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for ([c0, c1], rhs) in &rows {
        s00 += c0 * c0;
        s01 += c0 * c1;
        s11 += c1 * c1;
        r0 += c0 * rhs;
        r1 += c1 * rhs;
    }
    let det = s00 * s11 - s01 * s01;
    let scale = s00.max(s11).max(1e-300);
    let separate = if det.abs() > 1e-12 * scale * scale {
        let a = (r0 * s11 - r1 * s01) / det;
        let b = (s00 * r1 - s01 * r0) / det;
        (a > 0.0 && b > 0.0).then_some((a, b))
    } else {
        None
    };

    let (a, b) = match separate {
        Some(ab) => ab,
        None => {
            let (num, den) = rows.iter().fold((0.0, 0.0), |(n, d), ([c0, c1], rhs)| {
                let c = c0 + c1;
                (n + c * rhs, d + c * c)
            });
            let a = num / den;
            if !a.is_finite() || a <= 0.0 {
                return Err(SolverError::Degenerate("focal length from single view"));
            }
            (a, a)
        }
    };

    Ok(Matrix3::new(
        1.0 / a.sqrt(),
        0.0,
        0.0,
        0.0,
        1.0 / b.sqrt(),
        0.0,
        0.0,
        0.0,
        1.0,
    ))
}

/// Board pose from `K⁻¹ H` with the rotation snapped to SO(3).
fn pose_from_homography(k_inv: &Matrix3<f64>, h: &Matrix3<f64>) -> Result<ViewPose, SolverError> {
    let r1_raw = k_inv * h.column(0);
    let r2_raw = k_inv * h.column(1);
    let t_raw = k_inv * h.column(2);

    let mut scale = 2.0 / (r1_raw.norm() + r2_raw.norm()).max(1e-300);
    // Board must lie in front of the camera.
    if t_raw.z * scale < 0.0 {
        scale = -scale;
    }
    let r1 = r1_raw * scale;
    let r2 = r2_raw * scale;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r.svd(true, true);
    let (u, vt) = match (svd.u, svd.v_t) {
        (Some(u), Some(vt)) => (u, vt),
        _ => return Err(SolverError::Degenerate("pose svd")),
    };
    let mut rot = u * vt;
    if rot.determinant() < 0.0 {
        rot = -rot;
    }
    let rvec = Rotation3::from_matrix_unchecked(rot).scaled_axis();
    let tvec = t_raw * scale;
    if rvec.iter().chain(tvec.iter()).any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite);
    }
    Ok(ViewPose { rvec, tvec })
}

#[cfg(test)]
mod tests {
    use super::super::synthetic;
    use super::*;
    use sheet_inspect_core::Distortion;

    #[test]
    fn closed_form_is_close_without_distortion() {
        let (k, _) = synthetic::camera();
        let views = synthetic::views(&k, &Distortion::default(), &synthetic::poses());
        let init = initial_estimate(&views, [640, 480]).expect("init");
        assert!(init.full);
        assert!((init.intrinsics.fx - k.fx).abs() < 1.0, "{:?}", init.intrinsics);
        assert!((init.intrinsics.cy - k.cy).abs() < 1.0, "{:?}", init.intrinsics);
        let t = init.poses[0].tvec;
        assert!((t.z - 520.0).abs() < 1.0, "{t:?}");
    }
}
