use crate::camera::CalibrationParameters;
use crate::error::CalibrationError;
use crate::params::CalibrationParams;
use crate::pose::{pose_from_homography, BoardPose};
use crate::refine::{refine, rms, ReprojectionProblem};
use crate::zhang::initial_intrinsics;
use auralize_chessboard::{refine_corners, ChessboardDetector};
use auralize_core::{estimate_homography, GrayImage, GrayImageView};
use log::{debug, info, warn};
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Refined image corners of one detected board and their planar object points.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CornerSet {
    pub image_points: Vec<Point2<f64>>,
    pub object_points: Vec<Point3<f64>>,
}

impl CornerSet {
    /// Pair row-major image corners with object points `(i * s, j * s, 0)`.
    pub fn from_grid(image_points: Vec<Point2<f64>>, cols: usize, square_size: f64) -> Self {
        let object_points = (0..image_points.len())
            .map(|k| {
                Point3::new(
                    (k % cols) as f64 * square_size,
                    (k / cols) as f64 * square_size,
                    0.0,
                )
            })
            .collect();
        Self {
            image_points,
            object_points,
        }
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct CalibrationResult {
    pub parameters: CalibrationParameters,
    /// RMS reprojection error over all used corners, in pixels.
    pub rms: f64,
    /// RMS reprojection error of each used view.
    pub per_view_rms: Vec<f64>,
    /// Indices of the input images that contributed a view.
    pub view_indices: Vec<usize>,
    pub poses: Vec<BoardPose>,
    pub image_size: (usize, usize),
}

/// Chessboard calibration: detect, refine, solve.
pub struct CalibrationEstimator {
    params: CalibrationParams,
}

impl CalibrationEstimator {
    pub fn new(params: CalibrationParams) -> Result<Self, CalibrationError> {
        let p = &params;
        if p.board.rows < 2 || p.board.cols < 2 {
            return Err(CalibrationError::InvalidParams(format!(
                "pattern {}x{} needs at least 2x2 inner corners",
                p.board.cols, p.board.rows
            )));
        }
        if !(p.square_size.is_finite() && p.square_size > 0.0) {
            return Err(CalibrationError::InvalidParams(format!(
                "square size must be positive, got {}",
                p.square_size
            )));
        }
        if p.min_views == 0 {
            return Err(CalibrationError::InvalidParams(
                "min_views must be at least 1".to_string(),
            ));
        }
        let s = &p.solver;
        if ![s.ftol, s.xtol, s.gtol].iter().all(|t| t.is_finite() && *t >= 0.0)
            || !(s.stepbound.is_finite() && s.stepbound > 0.0)
        {
            return Err(CalibrationError::InvalidParams(format!(
                "solver tolerances must be non-negative and the step bound positive, got {s:?}"
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Detect and refine the board in one image.
    pub fn detect(&self, img: &GrayImageView<'_>) -> Option<CornerSet> {
        let detector = ChessboardDetector::new(self.params.board.clone());
        let detection = detector.detect(img)?;
        let mut corners = detection.corners;
        refine_corners(img, &mut corners, &self.params.subpix);
        let image_points = corners
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        Some(CornerSet::from_grid(
            image_points,
            detection.cols,
            self.params.square_size,
        ))
    }

    /// Run [`detect`](Self::detect) over every image, in parallel when
    /// `threads > 1`. Output order follows input order.
    pub fn detect_all(&self, images: &[GrayImage]) -> Result<Vec<Option<CornerSet>>, CalibrationError> {
        if self.params.threads <= 1 {
            return Ok(images.iter().map(|img| self.detect(&img.view())).collect());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.threads)
            .build()
            .map_err(|e| CalibrationError::InvalidParams(e.to_string()))?;
        Ok(pool.install(|| images.par_iter().map(|img| self.detect(&img.view())).collect()))
    }

    /// Full calibration from grayscale images of a common size.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, images), fields(images = images.len()))
    )]
    pub fn estimate(&self, images: &[GrayImage]) -> Result<CalibrationResult, CalibrationError> {
        let image_size = common_image_size(images)?;
        let detections = self.detect_all(images)?;
        self.estimate_from_detections(detections, image_size)
    }

    /// Calibrate from the per-image output of [`detect_all`](Self::detect_all);
    /// `None` entries are images without a board.
    pub fn estimate_from_detections(
        &self,
        detections: Vec<Option<CornerSet>>,
        image_size: (usize, usize),
    ) -> Result<CalibrationResult, CalibrationError> {
        let total = detections.len();
        let mut views = Vec::new();
        let mut view_indices = Vec::new();
        for (index, detection) in detections.into_iter().enumerate() {
            match detection {
                Some(set) => {
                    views.push(set);
                    view_indices.push(index);
                }
                None => debug!("image {index}: chessboard not found"),
            }
        }
        info!("chessboard found in {} of {} images", views.len(), total);

        if views.len() < self.params.min_views {
            return Err(CalibrationError::TooFewDetections {
                found: views.len(),
                total,
                required: self.params.min_views,
            });
        }

        let mut result = self.calibrate(&views, image_size)?;
        result.view_indices = view_indices;
        Ok(result)
    }

    /// Solve the camera model from already-extracted views.
    pub fn calibrate(
        &self,
        views: &[CornerSet],
        image_size: (usize, usize),
    ) -> Result<CalibrationResult, CalibrationError> {
        if views.len() < self.params.min_views {
            return Err(CalibrationError::TooFewDetections {
                found: views.len(),
                total: views.len(),
                required: self.params.min_views,
            });
        }

        let homographies = views
            .iter()
            .map(|v| {
                let plane: Vec<Point2<f64>> =
                    v.object_points.iter().map(|p| Point2::new(p.x, p.y)).collect();
                estimate_homography(&plane, &v.image_points)
                    .map(|h| h.h)
                    .ok_or(CalibrationError::DegenerateViews("homography estimation failed"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let intrinsics = initial_intrinsics(&homographies, image_size.0, image_size.1)?;
        debug!("initial intrinsics: {intrinsics:?}");
        let kmtx = intrinsics.k_matrix();
        let poses = homographies
            .iter()
            .map(|h| {
                pose_from_homography(&kmtx, h)
                    .ok_or(CalibrationError::DegenerateViews("pose decomposition failed"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let initial = CalibrationParameters::from_intrinsics(
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.cx,
            intrinsics.cy,
            [0.0; 5],
        );
        let x0 = ReprojectionProblem::pack(&initial, &poses);
        let (x, report) = refine(views, x0, &self.params.solver);

        let parameters = ReprojectionProblem::unpack_camera(&x);
        if !report.final_cost.is_finite()
            || !parameters.is_finite()
            || parameters.fx() <= 0.0
            || parameters.fy() <= 0.0
        {
            return Err(CalibrationError::SolverDiverged {
                iterations: report.iterations,
                cost: report.final_cost,
            });
        }
        if !report.converged {
            warn!(
                "solver stopped after {} evaluations before meeting its tolerances",
                report.iterations
            );
        }

        let poses: Vec<BoardPose> = (0..views.len())
            .map(|v| ReprojectionProblem::unpack_pose(&x, v))
            .collect();
        let per_view_rms: Vec<f64> = views
            .iter()
            .zip(&poses)
            .map(|(view, pose)| rms(&ReprojectionProblem::view_residuals(&parameters, pose, view)))
            .collect();
        let total_rms = rms(&ReprojectionProblem::new(views, x.clone()).residuals_at(&x));
        info!(
            "calibrated {} views: fx={:.2} fy={:.2} cx={:.2} cy={:.2}, RMS {:.4} px",
            views.len(),
            parameters.fx(),
            parameters.fy(),
            parameters.cx(),
            parameters.cy(),
            total_rms
        );

        Ok(CalibrationResult {
            parameters,
            rms: total_rms,
            per_view_rms,
            view_indices: (0..views.len()).collect(),
            poses,
            image_size,
        })
    }
}

/// Size shared by every image, `(0, 0)` for an empty set.
pub fn common_image_size(images: &[GrayImage]) -> Result<(usize, usize), CalibrationError> {
    let Some(first) = images.first() else {
        return Ok((0, 0));
    };
    let expected = (first.width, first.height);
    for (index, img) in images.iter().enumerate().skip(1) {
        let got = (img.width, img.height);
        if got != expected {
            return Err(CalibrationError::InconsistentImageSize {
                index,
                expected,
                got,
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{standard_poses, SyntheticCamera};

    fn truth() -> CalibrationParameters {
        CalibrationParameters::from_intrinsics(
            420.0,
            415.0,
            236.0,
            183.0,
            [-0.12, 0.03, 0.0005, -0.0008, 0.0],
        )
    }

    #[test]
    fn exact_corners_recover_camera() {
        let camera = SyntheticCamera::new(truth(), 480, 360);
        let views: Vec<CornerSet> = standard_poses(7, 9, 1.0, 16.0)
            .iter()
            .map(|pose| camera.corner_set(pose, 7, 9, 1.0))
            .collect();

        let estimator = CalibrationEstimator::new(CalibrationParams::default().with_pattern(7, 9))
            .expect("params");
        let result = estimator.calibrate(&views, (480, 360)).expect("calibrated");
        let p = result.parameters;

        assert!((p.fx() - 420.0).abs() < 1e-3, "fx = {}", p.fx());
        assert!((p.fy() - 415.0).abs() < 1e-3, "fy = {}", p.fy());
        assert!((p.cx() - 236.0).abs() < 1e-3, "cx = {}", p.cx());
        assert!((p.cy() - 183.0).abs() < 1e-3, "cy = {}", p.cy());
        assert!((p.dist_coefs[0] + 0.12).abs() < 1e-4, "k1 = {}", p.dist_coefs[0]);
        assert!(result.rms < 1e-4, "rms = {}", result.rms);
        assert_eq!(views.len(), result.per_view_rms.len());
    }

    #[test]
    fn too_few_views_fail() {
        let camera = SyntheticCamera::new(truth(), 480, 360);
        let views: Vec<CornerSet> = standard_poses(7, 9, 1.0, 16.0)
            .iter()
            .take(2)
            .map(|pose| camera.corner_set(pose, 7, 9, 1.0))
            .collect();
        let estimator = CalibrationEstimator::new(CalibrationParams::default().with_pattern(7, 9))
            .expect("params");
        let err = estimator.calibrate(&views, (480, 360)).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::TooFewDetections { found: 2, required: 3, .. }
        ));
    }

    #[test]
    fn mismatched_image_sizes_fail() {
        let estimator = CalibrationEstimator::new(CalibrationParams::default()).expect("params");
        let images = vec![GrayImage::new(64, 48), GrayImage::new(64, 48), GrayImage::new(48, 64)];
        let err = estimator.estimate(&images).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::InconsistentImageSize { index: 2, .. }
        ));
    }

    #[test]
    fn blank_images_are_dropped() {
        let estimator = CalibrationEstimator::new(CalibrationParams::default().with_threads(2))
            .expect("params");
        let images = vec![GrayImage::new(64, 48); 4];
        let err = estimator.estimate(&images).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::TooFewDetections { found: 0, total: 4, required: 3 }
        ));
    }

    #[test]
    fn invalid_square_size_is_rejected() {
        let params = CalibrationParams::default().with_square_size(0.0);
        assert!(matches!(
            CalibrationEstimator::new(params),
            Err(CalibrationError::InvalidParams(_))
        ));
    }

    #[test]
    fn negative_tolerance_or_zero_step_bound_is_rejected() {
        let mut params = CalibrationParams::default();
        params.solver.ftol = -1.0;
        assert!(matches!(
            CalibrationEstimator::new(params),
            Err(CalibrationError::InvalidParams(_))
        ));

        let mut params = CalibrationParams::default();
        params.solver.stepbound = 0.0;
        assert!(matches!(
            CalibrationEstimator::new(params),
            Err(CalibrationError::InvalidParams(_))
        ));
    }
}
