//! Joint refinement of intrinsics, distortion and board poses with
//! `levenberg-marquardt`.

use crate::camera::CalibrationParameters;
use crate::estimator::CornerSet;
use crate::params::SolverParams;
use crate::pose::BoardPose;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Vector3};

/// `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
pub(crate) const N_INTRINSICS: usize = 9;
const N_POSE: usize = 6;

/// Reprojection error of every view as a function of the packed parameters.
pub(crate) struct ReprojectionProblem<'a> {
    views: &'a [CornerSet],
    params: DVector<f64>,
}

#[derive(Clone, Debug)]
pub(crate) struct RefineReport {
    pub iterations: usize,
    /// `½‖r‖²` at the returned parameters.
    pub final_cost: f64,
    pub converged: bool,
}

impl<'a> ReprojectionProblem<'a> {
    pub fn new(views: &'a [CornerSet], x0: DVector<f64>) -> Self {
        Self { views, params: x0 }
    }

    pub fn num_params(&self) -> usize {
        N_INTRINSICS + N_POSE * self.views.len()
    }

    pub fn num_residuals(&self) -> usize {
        self.views.iter().map(|v| 2 * v.len()).sum()
    }

    pub fn pack(camera: &CalibrationParameters, poses: &[BoardPose]) -> DVector<f64> {
        let mut x = DVector::zeros(N_INTRINSICS + N_POSE * poses.len());
        x[0] = camera.fx();
        x[1] = camera.fy();
        x[2] = camera.cx();
        x[3] = camera.cy();
        for (k, d) in camera.dist_coefs.iter().enumerate() {
            x[4 + k] = *d;
        }
        for (v, pose) in poses.iter().enumerate() {
            let o = N_INTRINSICS + N_POSE * v;
            x.fixed_rows_mut::<3>(o).copy_from(&pose.rvec);
            x.fixed_rows_mut::<3>(o + 3).copy_from(&pose.tvec);
        }
        x
    }

    pub fn unpack_camera(x: &DVector<f64>) -> CalibrationParameters {
        CalibrationParameters::from_intrinsics(
            x[0],
            x[1],
            x[2],
            x[3],
            [x[4], x[5], x[6], x[7], x[8]],
        )
    }

    pub fn unpack_pose(x: &DVector<f64>, view: usize) -> BoardPose {
        let o = N_INTRINSICS + N_POSE * view;
        BoardPose::new(
            Vector3::new(x[o], x[o + 1], x[o + 2]),
            Vector3::new(x[o + 3], x[o + 4], x[o + 5]),
        )
    }

    /// Residuals `projected - observed` of one view, interleaved `(dx, dy)`.
    pub fn view_residuals(
        camera: &CalibrationParameters,
        pose: &BoardPose,
        view: &CornerSet,
    ) -> DVector<f64> {
        let rotation = pose.rotation();
        let mut r = DVector::zeros(2 * view.len());
        for (k, (obj, img)) in view
            .object_points
            .iter()
            .zip(&view.image_points)
            .enumerate()
        {
            let pc = rotation * obj + pose.tvec;
            let p = camera.project(&pc);
            r[2 * k] = p.x - img.x;
            r[2 * k + 1] = p.y - img.y;
        }
        r
    }

    fn view_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.views.len());
        let mut row = 0;
        for v in self.views {
            offsets.push(row);
            row += 2 * v.len();
        }
        offsets
    }

    pub fn residuals_at(&self, x: &DVector<f64>) -> DVector<f64> {
        let camera = Self::unpack_camera(x);
        let mut r = DVector::zeros(self.num_residuals());
        for ((v, view), row) in self.views.iter().enumerate().zip(self.view_offsets()) {
            let pose = Self::unpack_pose(x, v);
            r.rows_mut(row, 2 * view.len())
                .copy_from(&Self::view_residuals(&camera, &pose, view));
        }
        r
    }

    /// Intrinsic columns touch every row; pose columns only their own view.
    fn jacobian_at(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.num_residuals(), self.num_params());
        let base = self.residuals_at(x);
        numeric_columns(x, 0..N_INTRINSICS, &base, |p| self.residuals_at(p), &mut jac, 0);

        let camera = Self::unpack_camera(x);
        for ((v, view), row) in self.views.iter().enumerate().zip(self.view_offsets()) {
            let o = N_INTRINSICS + N_POSE * v;
            let view_base = base.rows(row, 2 * view.len()).into_owned();
            numeric_columns(
                x,
                o..o + N_POSE,
                &view_base,
                |p| Self::view_residuals(&camera, &Self::unpack_pose(p, v), view),
                &mut jac,
                row,
            );
        }
        jac
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ReprojectionProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    /// `None` once the parameters leave the region where projection is finite.
    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.residuals_at(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.jacobian_at(&self.params))
    }
}

/// Minimise the reprojection error of `views` starting from `x0`.
pub(crate) fn refine(
    views: &[CornerSet],
    x0: DVector<f64>,
    opts: &SolverParams,
) -> (DVector<f64>, RefineReport) {
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_stepbound(opts.stepbound)
        .with_patience(opts.max_iters.max(1));

    let (problem, report) = lm.minimize(ReprojectionProblem::new(views, x0));
    let converged = report.termination.was_successful();
    debug!(
        "LM: cost {:.6e} after {} evaluations ({:?})",
        report.objective_function, report.number_of_evaluations, report.termination
    );
    (
        problem.params,
        RefineReport {
            iterations: report.number_of_evaluations,
            final_cost: report.objective_function,
            converged,
        },
    )
}

/// Forward-difference Jacobian of `residual` restricted to `columns`,
/// written into `jac` starting at `row_offset`.
fn numeric_columns<F>(
    x: &DVector<f64>,
    columns: std::ops::Range<usize>,
    base: &DVector<f64>,
    mut residual: F,
    jac: &mut DMatrix<f64>,
    row_offset: usize,
) where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let mut shifted = x.clone();
    for c in columns {
        let h = 1e-7 * x[c].abs().max(1.0);
        shifted[c] = x[c] + h;
        let r_plus = residual(&shifted);
        shifted[c] = x[c];
        for (k, (rp, r0)) in r_plus.iter().zip(base.iter()).enumerate() {
            jac[(row_offset + k, c)] = (rp - r0) / h;
        }
    }
}

/// Root mean square of the per-point reprojection distance.
pub(crate) fn rms(residuals: &DVector<f64>) -> f64 {
    let points = residuals.len() / 2;
    if points == 0 {
        return 0.0;
    }
    (residuals.norm_squared() / points as f64).sqrt()
}
