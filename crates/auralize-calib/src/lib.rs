//! Chessboard camera calibration and lens undistortion.
//!
//! 1. [`CalibrationEstimator`] detects the board in every image (in parallel),
//!    refines corners to subpixel accuracy and drops images without a board.
//! 2. Per-view homographies give a closed-form intrinsics estimate and board
//!    poses; Levenberg-Marquardt then refines `fx, fy, cx, cy, k1, k2, p1, p2,
//!    k3` and all poses against the reprojection error.
//! 3. [`save_calibration`] / [`load_calibration`] persist the camera matrix
//!    and distortion vector as two JSON arrays.
//! 4. [`Undistorter`] remaps frames through the inverse distortion model with
//!    an `alpha`-blended optimal camera matrix.
//!
//! ```
//! use auralize_calib::{CalibrationEstimator, CalibrationParams};
//! use auralize_core::GrayImage;
//!
//! let estimator = CalibrationEstimator::new(CalibrationParams::default()).unwrap();
//! let images = vec![GrayImage::new(64, 48); 3];
//! assert!(estimator.estimate(&images).is_err());
//! ```

mod camera;
pub mod debug;
mod error;
mod estimator;
mod params;
mod pose;
mod refine;
mod store;
pub mod synthetic;
mod undistort;
mod zhang;

pub use camera::CalibrationParameters;
pub use error::{CalibrationError, StoreError};
pub use estimator::{common_image_size, CalibrationEstimator, CalibrationResult, CornerSet};
pub use params::{CalibrationParams, SolverParams, UndistortParams};
pub use pose::{pose_from_homography, BoardPose};
pub use store::{
    load_calibration, save_calibration, write_camera_settings, CAMERA_MATRIX_FILE,
    DEFAULT_CALIBRATION_DIR, DIST_COEFS_FILE,
};
pub use undistort::{optimal_new_camera_matrix, undistort, Roi, UndistortMap, Undistorter};
pub use zhang::{
    estimate_focal_with_center, estimate_intrinsics_from_homographies, initial_intrinsics,
    LinearIntrinsics,
};
