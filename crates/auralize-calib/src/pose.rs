use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

/// Board pose in the camera frame: Rodrigues rotation vector and translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardPose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl BoardPose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_scaled_axis(self.rvec)
    }

    /// Board point to camera frame.
    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Decompose a plane-to-image homography into a board pose given `K`.
///
/// The board lies on `Z = 0`. The rotation is projected onto SO(3) and the
/// sign is fixed so the board sits in front of the camera.
pub fn pose_from_homography(kmtx: &Matrix3<f64>, hmtx: &Matrix3<f64>) -> Option<BoardPose> {
    let k_inv = kmtx.try_inverse()?;
    let k_inv_h1 = k_inv * hmtx.column(0);
    let k_inv_h2 = k_inv * hmtx.column(1);
    let k_inv_h3 = k_inv * hmtx.column(2);

    let mean_norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if mean_norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / mean_norm;
    if k_inv_h3[2] * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * k_inv_h1;
    let r2 = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);
    let r_mat = Matrix3::from_columns(&[r1, r2, r3]);

    // Closest rotation (polar decomposition).
    let svd = r_mat.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r_orth);
    Some(BoardPose::new(rotation.scaled_axis(), lambda * k_inv_h3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_pose_from_h_recovers_pose() {
        let kmtx = Matrix3::new(800.0, 0.0, 640.0, 0.0, 780.0, 360.0, 0.0, 0.0, 1.0);
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);

        let r = rot.matrix();
        let mut hmtx = Matrix3::zeros();
        hmtx.set_column(0, &(kmtx * r.column(0)));
        hmtx.set_column(1, &(kmtx * r.column(1)));
        hmtx.set_column(2, &(kmtx * t));
        // Homographies are only defined up to scale, sign included.
        let pose = pose_from_homography(&kmtx, &(hmtx * -2.5)).expect("pose");

        assert!((pose.tvec - t).norm() < 1e-9, "t = {:?}", pose.tvec);
        assert!((pose.rotation().matrix() - r).norm() < 1e-9);
    }
}
