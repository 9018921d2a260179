//! Pinhole camera with Brown-Conrady (k1, k2, p1, p2, k3) distortion.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERS: usize = 20;

/// Intrinsic matrix and distortion coefficients `[k1, k2, p1, p2, k3]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coefs: [f64; 5],
}

impl CalibrationParameters {
    pub fn new(camera_matrix: [[f64; 3]; 3], dist_coefs: [f64; 5]) -> Self {
        Self {
            camera_matrix,
            dist_coefs,
        }
    }

    /// Zero-skew camera matrix from focal lengths and principal point.
    pub fn from_intrinsics(fx: f64, fy: f64, cx: f64, cy: f64, dist_coefs: [f64; 5]) -> Self {
        Self::new([[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]], dist_coefs)
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }

    pub fn k_matrix(&self) -> Matrix3<f64> {
        let k = &self.camera_matrix;
        Matrix3::new(
            k[0][0], k[0][1], k[0][2], //
            k[1][0], k[1][1], k[1][2], //
            k[2][0], k[2][1], k[2][2],
        )
    }

    pub fn is_finite(&self) -> bool {
        self.camera_matrix.iter().flatten().all(|v| v.is_finite())
            && self.dist_coefs.iter().all(|v| v.is_finite())
    }

    /// Apply lens distortion to an ideal normalized image point.
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2, k3] = self.dist_coefs;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`distort`](Self::distort) by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERS {
            let (dx, dy) = self.distort(x, y);
            x -= dx - xd;
            y -= dy - yd;
        }
        (x, y)
    }

    /// Normalized image point to pixels, distortion included.
    #[inline]
    pub fn normalized_to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        let (xd, yd) = self.distort(x, y);
        let k = &self.camera_matrix;
        Point2::new(
            k[0][0] * xd + k[0][1] * yd + k[0][2],
            k[1][1] * yd + k[1][2],
        )
    }

    /// Pixel to ideal (undistorted) normalized image point.
    pub fn pixel_to_normalized(&self, p: Point2<f64>) -> (f64, f64) {
        let k = &self.camera_matrix;
        let yd = (p.y - k[1][2]) / k[1][1];
        let xd = (p.x - k[0][2] - k[0][1] * yd) / k[0][0];
        self.undistort(xd, yd)
    }

    /// Project a camera-frame point. Points behind the camera still project
    /// through the same formula; callers filter them when it matters.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        self.normalized_to_pixel(p.x / p.z, p.y / p.z)
    }

    /// Camera block of an ORB-SLAM settings file (`Camera.fx` ... `Camera.k3`).
    pub fn to_camera_settings(&self) -> BTreeMap<String, f64> {
        let [k1, k2, p1, p2, k3] = self.dist_coefs;
        [
            ("Camera.fx", self.fx()),
            ("Camera.fy", self.fy()),
            ("Camera.cx", self.cx()),
            ("Camera.cy", self.cy()),
            ("Camera.k1", k1),
            ("Camera.k2", k2),
            ("Camera.p1", p1),
            ("Camera.p2", p2),
            ("Camera.k3", k3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}
