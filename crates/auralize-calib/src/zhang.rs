//! Closed-form intrinsics from plane homographies.

use crate::error::CalibrationError;
use nalgebra::{DMatrix, Matrix3, SVector};

/// Linear intrinsics estimate: focal lengths and principal point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl LinearIntrinsics {
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    fn is_plausible(&self, width: usize, height: usize) -> bool {
        [self.fx, self.fy, self.cx, self.cy].iter().all(|v| v.is_finite())
            && self.fx > 0.0
            && self.fy > 0.0
            && (0.0..width as f64).contains(&self.cx)
            && (0.0..height as f64).contains(&self.cy)
    }
}

/// The 6-vector `v_ij(H)` of Zhang's method.
fn v_ij(hmtx: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Zhang's closed-form solution, skew included in the solve but dropped from
/// the result. Needs at least 3 homographies.
pub fn estimate_intrinsics_from_homographies(
    hmtxs: &[Matrix3<f64>],
) -> Result<LinearIntrinsics, CalibrationError> {
    if hmtxs.len() < 3 {
        return Err(CalibrationError::DegenerateViews(
            "need at least 3 homographies",
        ));
    }

    let m = hmtxs.len();
    let mut vmtx = DMatrix::<f64>::zeros(2 * m, 6);
    for (k, hmtx) in hmtxs.iter().enumerate() {
        let v11 = v_ij(hmtx, 0, 0);
        let v22 = v_ij(hmtx, 1, 1);
        let v12 = v_ij(hmtx, 0, 1);
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    // V b = 0: right singular vector of the smallest singular value.
    let svd = vmtx.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(CalibrationError::DegenerateViews("SVD failed"))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(CalibrationError::DegenerateViews("SVD failed"))?;
    let b = v_t.row(min_idx);
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm <= 1e-9 {
        return Err(CalibrationError::DegenerateViews(
            "homographies do not constrain the image of the absolute conic",
        ));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda.signum() != b11.signum() {
        return Err(CalibrationError::DegenerateViews("invalid sign for λ"));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(LinearIntrinsics {
        fx: alpha,
        fy: beta,
        cx: u0,
        cy: v0,
    })
}

/// Focal lengths with the principal point fixed at `(cx, cy)`.
///
/// Solves the orthogonality and equal-norm constraints on `[r1 r2]` for
/// `1/fx²` and `1/fy²` in the least-squares sense. Works with a single
/// non-frontal view.
pub fn estimate_focal_with_center(
    hmtxs: &[Matrix3<f64>],
    cx: f64,
    cy: f64,
) -> Result<LinearIntrinsics, CalibrationError> {
    let shift_inv = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let m = hmtxs.len();
    let mut a = DMatrix::<f64>::zeros(2 * m, 2);
    let mut b = nalgebra::DVector::<f64>::zeros(2 * m);

    for (k, hmtx) in hmtxs.iter().enumerate() {
        let h = shift_inv * hmtx;
        let (h1, h2) = (h.column(0), h.column(1));
        a[(2 * k, 0)] = h1[0] * h2[0];
        a[(2 * k, 1)] = h1[1] * h2[1];
        b[2 * k] = -h1[2] * h2[2];
        a[(2 * k + 1, 0)] = h1[0] * h1[0] - h2[0] * h2[0];
        a[(2 * k + 1, 1)] = h1[1] * h1[1] - h2[1] * h2[1];
        b[2 * k + 1] = -(h1[2] * h1[2] - h2[2] * h2[2]);
    }

    let inv_f2 = a
        .svd(true, true)
        .solve(&b, 1e-15)
        .map_err(|_| CalibrationError::DegenerateViews("focal system is singular"))?;
    if inv_f2[0] <= 0.0 || inv_f2[1] <= 0.0 {
        return Err(CalibrationError::DegenerateViews(
            "views are too close to fronto-parallel",
        ));
    }

    Ok(LinearIntrinsics {
        fx: (1.0 / inv_f2[0]).sqrt(),
        fy: (1.0 / inv_f2[1]).sqrt(),
        cx,
        cy,
    })
}

/// Zhang's estimate when it is usable, otherwise focal lengths around the
/// image center.
pub fn initial_intrinsics(
    hmtxs: &[Matrix3<f64>],
    width: usize,
    height: usize,
) -> Result<LinearIntrinsics, CalibrationError> {
    match estimate_intrinsics_from_homographies(hmtxs) {
        Ok(intr) if intr.is_plausible(width, height) => Ok(intr),
        other => {
            log::debug!("falling back to centered focal estimate: {other:?}");
            let cx = (width as f64 - 1.0) * 0.5;
            let cy = (height as f64 - 1.0) * 0.5;
            estimate_focal_with_center(hmtxs, cx, cy)
        }
    }
}
