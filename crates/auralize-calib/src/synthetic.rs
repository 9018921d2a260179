//! Synthetic chessboard views through a known camera, for tests and demos.

use crate::camera::CalibrationParameters;
use crate::estimator::CornerSet;
use crate::pose::BoardPose;
use auralize_core::GrayImage;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

const DARK: f64 = 20.0;
const LIGHT: f64 = 235.0;

/// A camera with known parameters and image size.
#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    pub params: CalibrationParameters,
    pub width: usize,
    pub height: usize,
}

impl SyntheticCamera {
    pub fn new(params: CalibrationParameters, width: usize, height: usize) -> Self {
        Self {
            params,
            width,
            height,
        }
    }

    /// Distorted pixel positions of the inner corners, row-major.
    pub fn project_board(
        &self,
        pose: &BoardPose,
        rows: usize,
        cols: usize,
        square: f64,
    ) -> Vec<Point2<f64>> {
        (0..rows * cols)
            .map(|k| {
                let obj = Point3::new((k % cols) as f64 * square, (k / cols) as f64 * square, 0.0);
                self.params.project(&pose.transform(&obj))
            })
            .collect()
    }

    pub fn corner_set(&self, pose: &BoardPose, rows: usize, cols: usize, square: f64) -> CornerSet {
        CornerSet::from_grid(self.project_board(pose, rows, cols, square), cols, square)
    }
}

/// Renders boards with `supersample²` rays per pixel; the undistorted ray of
/// every sample is computed once.
pub struct BoardRenderer {
    width: usize,
    height: usize,
    supersample: usize,
    rays: Vec<(f64, f64)>,
}

impl BoardRenderer {
    pub fn new(camera: &SyntheticCamera, supersample: usize) -> Self {
        let ss = supersample.max(1);
        let mut rays = Vec::with_capacity(camera.width * camera.height * ss * ss);
        for y in 0..camera.height {
            for x in 0..camera.width {
                for sy in 0..ss {
                    for sx in 0..ss {
                        let px = x as f64 - 0.5 + (sx as f64 + 0.5) / ss as f64;
                        let py = y as f64 - 0.5 + (sy as f64 + 0.5) / ss as f64;
                        rays.push(camera.params.pixel_to_normalized(Point2::new(px, py)));
                    }
                }
            }
        }
        Self {
            width: camera.width,
            height: camera.height,
            supersample: ss,
            rays,
        }
    }

    /// Render a board of `rows x cols` inner corners with a one-square white
    /// border; everything off the board is white too.
    pub fn render(&self, pose: &BoardPose, rows: usize, cols: usize, square: f64) -> GrayImage {
        let r = pose.rotation();
        let rm = r.matrix();
        let plane_to_ray = Matrix3::from_columns(&[
            rm.column(0).into_owned(),
            rm.column(1).into_owned(),
            pose.tvec,
        ]);
        let ray_to_plane = plane_to_ray.try_inverse();

        let samples = self.supersample * self.supersample;
        let mut img = GrayImage::new(self.width, self.height);
        for (pixel, chunk) in self.rays.chunks(samples).enumerate() {
            let mut acc = 0.0;
            for &(x, y) in chunk {
                acc += match ray_to_plane {
                    Some(inv) => shade(inv * Vector3::new(x, y, 1.0), rows, cols, square),
                    None => LIGHT,
                };
            }
            img.data[pixel] = (acc / samples as f64).round().clamp(0.0, 255.0) as u8;
        }
        img
    }
}

fn shade(plane: Vector3<f64>, rows: usize, cols: usize, square: f64) -> f64 {
    // Behind the camera or at infinity.
    if plane[2] <= 1e-12 {
        return LIGHT;
    }
    let u = plane[0] / plane[2] / square;
    let v = plane[1] / plane[2] / square;
    if u < -1.0 || v < -1.0 || u >= cols as f64 || v >= rows as f64 {
        return LIGHT;
    }
    let parity = (u.floor() as i64 + v.floor() as i64).rem_euclid(2);
    if parity == 0 {
        DARK
    } else {
        LIGHT
    }
}

/// A spread of tilted poses looking at the board center from `distance`.
pub fn standard_poses(rows: usize, cols: usize, square: f64, distance: f64) -> Vec<BoardPose> {
    let center = Vector3::new(
        (cols as f64 - 1.0) * square * 0.5,
        (rows as f64 - 1.0) * square * 0.5,
        0.0,
    );
    [
        (0.35, 0.0, 0.05, 0.5, -0.3),
        (-0.35, 0.0, -0.05, -0.4, 0.2),
        (0.0, 0.35, 0.0, 0.3, 0.4),
        (0.0, -0.35, 0.08, -0.5, -0.2),
        (0.25, 0.25, -0.06, 0.2, 0.1),
        (-0.25, 0.2, 0.04, -0.2, -0.4),
        (0.2, -0.3, 0.0, 0.0, 0.3),
    ]
    .iter()
    .map(|&(rx, ry, rz, ox, oy)| {
        let rot = Rotation3::from_euler_angles(rx, ry, rz);
        let t = Vector3::new(ox * square, oy * square, distance * square) - rot * center;
        BoardPose::new(rot.scaled_axis(), t)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> SyntheticCamera {
        SyntheticCamera::new(
            CalibrationParameters::from_intrinsics(300.0, 300.0, 80.0, 60.0, [0.0; 5]),
            160,
            120,
        )
    }

    #[test]
    fn board_center_projects_near_principal_point() {
        let cam = camera();
        let poses = standard_poses(3, 3, 1.0, 20.0);
        // Middle corner of a 3x3 grid is the board center.
        let p = cam.project_board(&poses[4], 3, 3, 1.0)[4];
        assert!((p.x - 80.0).abs() < 20.0 && (p.y - 60.0).abs() < 20.0, "{p:?}");
    }

    #[test]
    fn render_contains_both_shades() {
        let cam = camera();
        let renderer = BoardRenderer::new(&cam, 1);
        let pose = BoardPose::new(Vector3::zeros(), Vector3::new(-1.0, -1.0, 20.0));
        let img = renderer.render(&pose, 3, 3, 1.0);
        assert!(img.data.iter().any(|&v| v < 50));
        assert!(img.data.iter().any(|&v| v > 200));
        // Far corner of the image sees only the white surround.
        assert_eq!(LIGHT as u8, img.data[0]);
    }
}
