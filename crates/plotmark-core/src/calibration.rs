//! Planar intrinsic calibration: Zhang's closed form for the intrinsics and
//! poses, then Levenberg-Marquardt on the reprojection error with the two
//! leading radial distortion terms freed.

use crate::{estimate_homography, CameraIntrinsics, CameraModel, Distortion, Homography};
use log::debug;
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Rotation3, Vector3, Vector6};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CalibrationError {
    #[error("calibration needs at least one view, got none")]
    NoViews,
    #[error("view {view} has {got} points, expected {expected}")]
    PointCountMismatch {
        view: usize,
        got: usize,
        expected: usize,
    },
    #[error("homography estimation failed for view {0}")]
    Homography(usize),
    #[error("closed-form intrinsics are degenerate (views too similar?)")]
    Degenerate,
}

/// One view's board pose.
#[derive(Clone, Copy, Debug)]
struct Pose {
    r: Matrix3<f64>,
    t: Vector3<f64>,
}

/// Board corners in board units: `(col, row, 0)` for a `cols x rows` inner-corner
/// lattice, row-major.
pub fn planar_object_points(cols: usize, rows: usize, square: f32) -> Vec<Point2<f32>> {
    (0..rows)
        .flat_map(|j| (0..cols).map(move |i| Point2::new(i as f32 * square, j as f32 * square)))
        .collect()
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> Vector6<f64> {
    let hi = h.column(i);
    let hj = h.column(j);
    Vector6::new(
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    )
}

fn intrinsics_from_homographies(hs: &[Homography]) -> Result<CameraIntrinsics, CalibrationError> {
    // Fewer than three views cannot fix skew; pin it to zero instead.
    let extra = usize::from(hs.len() < 3);
    let rows = 2 * hs.len() + extra;
    let mut v = DMatrix::<f64>::zeros(rows.max(6), 6);
    for (k, h) in hs.iter().enumerate() {
        let v12 = v_ij(&h.h, 0, 1);
        let d = v_ij(&h.h, 0, 0) - v_ij(&h.h, 1, 1);
        for c in 0..6 {
            v[(2 * k, c)] = v12[c];
            v[(2 * k + 1, c)] = d[c];
        }
    }
    if extra == 1 {
        v[(2 * hs.len(), 1)] = 1.0;
    }

    let svd = v.svd(false, true);
    let vt = svd.v_t.ok_or(CalibrationError::Degenerate)?;
    let b = vt.row(vt.nrows() - 1);
    let (mut b11, mut b12, mut b22, mut b13, mut b23, mut b33) =
        (b[0], b[1], b[2], b[3], b[4], b[5]);
    if b11 < 0.0 {
        b11 = -b11;
        b12 = -b12;
        b22 = -b22;
        b13 = -b13;
        b23 = -b23;
        b33 = -b33;
    }

    let den = b11 * b22 - b12 * b12;
    if den.abs() < 1e-300 || b11.abs() < 1e-300 {
        return Err(CalibrationError::Degenerate);
    }
    let v0 = (b12 * b13 - b11 * b23) / den;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / den;
    if !(alpha_sq > 0.0 && beta_sq > 0.0) {
        return Err(CalibrationError::Degenerate);
    }
    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(CameraIntrinsics {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
        skew: gamma,
    })
}

fn pose_from_homography(k_inv: &Matrix3<f64>, h: &Homography) -> Pose {
    let h1 = k_inv * h.h.column(0);
    let h2 = k_inv * h.h.column(1);
    let h3 = k_inv * h.h.column(2);
    let scale = 1.0 / h1.norm();
    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);

    // Closest rotation in the Frobenius sense.
    let svd = approx.svd(true, true);
    let r = match (svd.u, svd.v_t) {
        (Some(u), Some(vt)) => u * vt,
        _ => approx,
    };
    Pose { r, t: h3 * scale }
}

/// Refined unknowns: `[fx, fy, cx, cy, skew, k1, k2]`, then a rotation vector
/// and a translation per view.
const CAMERA_PARAMS: usize = 7;
const VIEW_PARAMS: usize = 6;
const MAX_ITERATIONS: usize = 100;

fn pack_params(intr: &CameraIntrinsics, poses: &[Pose]) -> DVector<f64> {
    let mut p = DVector::zeros(CAMERA_PARAMS + VIEW_PARAMS * poses.len());
    p[0] = intr.fx;
    p[1] = intr.fy;
    p[2] = intr.cx;
    p[3] = intr.cy;
    p[4] = intr.skew;
    for (i, pose) in poses.iter().enumerate() {
        let base = CAMERA_PARAMS + VIEW_PARAMS * i;
        let r = Rotation3::from_matrix(&pose.r).scaled_axis();
        for k in 0..3 {
            p[base + k] = r[k];
            p[base + 3 + k] = pose.t[k];
        }
    }
    p
}

fn unpack_camera(p: &DVector<f64>) -> (CameraIntrinsics, Distortion) {
    let intr = CameraIntrinsics {
        fx: p[0],
        fy: p[1],
        cx: p[2],
        cy: p[3],
        skew: p[4],
    };
    let dist = Distortion {
        k1: p[5],
        k2: p[6],
        ..Distortion::default()
    };
    (intr, dist)
}

/// Observed minus predicted pixel, `x` then `y`, view by view.
fn residuals(p: &DVector<f64>, object: &[Point2<f32>], views: &[Vec<Point2<f32>>]) -> DVector<f64> {
    let (intr, dist) = unpack_camera(p);
    let mut out = DVector::zeros(2 * views.len() * object.len());
    for (v, view) in views.iter().enumerate() {
        let base = CAMERA_PARAMS + VIEW_PARAMS * v;
        let r = Rotation3::new(Vector3::new(p[base], p[base + 1], p[base + 2]));
        let t = Vector3::new(p[base + 3], p[base + 4], p[base + 5]);
        for (k, (obj, obs)) in object.iter().zip(view).enumerate() {
            let pc = r * Vector3::new(obj.x as f64, obj.y as f64, 0.0) + t;
            if pc.z.abs() < 1e-12 {
                continue;
            }
            let px = intr.project(dist.distort(Point2::new(pc.x / pc.z, pc.y / pc.z)));
            let row = 2 * (v * object.len() + k);
            out[row] = obs.x as f64 - px.x;
            out[row + 1] = obs.y as f64 - px.y;
        }
    }
    out
}

/// Central differences over the `free` parameters.
fn jacobian(
    p: &DVector<f64>,
    free: &[usize],
    object: &[Point2<f32>],
    views: &[Vec<Point2<f32>>],
) -> DMatrix<f64> {
    let m = 2 * views.len() * object.len();
    let mut jac = DMatrix::zeros(m, free.len());
    let mut shifted = p.clone();
    for (col, &idx) in free.iter().enumerate() {
        let h = 1e-6 * (1.0 + p[idx].abs());
        shifted[idx] = p[idx] + h;
        let plus = residuals(&shifted, object, views);
        shifted[idx] = p[idx] - h;
        let minus = residuals(&shifted, object, views);
        shifted[idx] = p[idx];
        jac.set_column(col, &((plus - minus) / (2.0 * h)));
    }
    jac
}

/// Levenberg-Marquardt on the reprojection error, starting from `p`.
fn refine(
    mut p: DVector<f64>,
    free: &[usize],
    object: &[Point2<f32>],
    views: &[Vec<Point2<f32>>],
) -> DVector<f64> {
    let mut r = residuals(&p, object, views);
    let mut cost = r.norm_squared();
    let mut lambda = 1e-3;
    let mut normal = None;

    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal.get_or_insert_with(|| {
            let jac = jacobian(&p, free, object, views);
            let jt = jac.transpose();
            (&jt * &jac, &jt * &r)
        });

        let mut damped = jtj.clone();
        for k in 0..free.len() {
            damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
        }
        let Some(chol) = damped.cholesky() else {
            lambda *= 10.0;
            continue;
        };
        let delta = chol.solve(&(-&*jtr));

        let mut trial = p.clone();
        for (k, &idx) in free.iter().enumerate() {
            trial[idx] += delta[k];
        }
        let trial_r = residuals(&trial, object, views);
        let trial_cost = trial_r.norm_squared();

        if trial_cost < cost {
            let gain = cost - trial_cost;
            p = trial;
            r = trial_r;
            cost = trial_cost;
            normal = None;
            lambda = (lambda * 0.1).max(1e-12);
            if cost < 1e-20 || gain <= 1e-15 * (1.0 + cost) {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }
    p
}

fn rms(p: &DVector<f64>, object: &[Point2<f32>], views: &[Vec<Point2<f32>>]) -> f64 {
    let r = residuals(p, object, views);
    (r.norm_squared() / (r.len() / 2).max(1) as f64).sqrt()
}

/// Estimate a camera from several views of the same planar grid.
///
/// `object` holds the board-plane coordinates shared by every view and
/// `views[i][k]` is the observed pixel of `object[k]` in view `i`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(object, views), fields(views = views.len(), points = object.len()))
)]
pub fn calibrate_planar(
    object: &[Point2<f32>],
    views: &[Vec<Point2<f32>>],
) -> Result<CameraModel, CalibrationError> {
    if views.is_empty() {
        return Err(CalibrationError::NoViews);
    }
    let mut hs = Vec::with_capacity(views.len());
    for (i, view) in views.iter().enumerate() {
        if view.len() != object.len() {
            return Err(CalibrationError::PointCountMismatch {
                view: i,
                got: view.len(),
                expected: object.len(),
            });
        }
        hs.push(estimate_homography(object, view).ok_or(CalibrationError::Homography(i))?);
    }

    let intr = intrinsics_from_homographies(&hs)?;
    let k_inv = intr
        .matrix()
        .try_inverse()
        .ok_or(CalibrationError::Degenerate)?;
    let poses: Vec<Pose> = hs.iter().map(|h| pose_from_homography(&k_inv, h)).collect();

    // Skew stays pinned with fewer than three views, as in the closed form.
    let free: Vec<usize> = (0..CAMERA_PARAMS + VIEW_PARAMS * views.len())
        .filter(|&i| i != 4 || views.len() >= 3)
        .collect();
    let initial = pack_params(&intr, &poses);
    debug!("closed-form reprojection rms {:.4} px", rms(&initial, object, views));
    let refined = refine(initial, &free, object, views);
    debug!("refined reprojection rms {:.4} px", rms(&refined, object, views));
    let (intr, distortion) = unpack_camera(&refined);

    debug!(
        "calibrated fx={:.2} fy={:.2} cx={:.2} cy={:.2} k1={:.5} k2={:.5} from {} views",
        intr.fx,
        intr.fy,
        intr.cx,
        intr.cy,
        distortion.k1,
        distortion.k2,
        views.len()
    );
    Ok(CameraModel::new(intr, distortion))
}
