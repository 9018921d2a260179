use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

/// Plane-to-image projective transform, `p_dst ~ H * p_src`.
///
/// Used to map board-plane corner coordinates onto detected pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity that moves the centroid to the origin and the mean radius to sqrt(2).
fn conditioning(pts: &[Point2<f64>]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(Vector3::zeros(), |acc, p| {
        acc + Vector3::new(p.x, p.y, 0.0)
    }) / n;
    let radius = pts
        .iter()
        .map(|p| (p.coords - centroid.xy()).norm())
        .sum::<f64>()
        / n;
    let s = if radius > 1e-12 {
        std::f64::consts::SQRT_2 / radius
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * centroid.x, 0.0, s, -s * centroid.y, 0.0, 0.0, 1.0)
}

#[inline]
fn condition(t: &Matrix3<f64>, p: Point2<f64>) -> (f64, f64) {
    (t[(0, 0)] * p.x + t[(0, 2)], t[(1, 1)] * p.y + t[(1, 2)])
}

/// Normalized DLT estimate of `H` with `dst ~ H * src`.
///
/// Needs at least four correspondences. Returns `None` for mismatched or
/// degenerate input.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let ts = conditioning(src);
    let td = conditioning(dst);

    // Zero rows pad the 4-point case so the SVD yields a full V.
    let mut a = DMatrix::<f64>::zeros((2 * src.len()).max(9), 9);
    for (k, (ps, pd)) in src.iter().zip(dst).enumerate() {
        let (x, y) = condition(&ts, *ps);
        let (u, v) = condition(&td, *pd);
        let r = 2 * k;
        a.row_mut(r)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v]);
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let h = v_t.row(smallest);
    let conditioned = Matrix3::from_iterator((0..9).map(|i| h[(i % 3) * 3 + i / 3]));

    let h = td.try_inverse()? * conditioned * ts;
    let w = h[(2, 2)];
    (w.abs() > 1e-12).then(|| Homography::new(h / w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    const FX: f64 = 800.0;
    const CX: f64 = 320.0;
    const CY: f64 = 240.0;

    /// Pinhole projection of a board point `(x, y, 0)` seen by a tilted camera.
    fn project(board: Point2<f64>) -> Point2<f64> {
        let r = Rotation3::from_euler_angles(0.15, -0.35, 0.05);
        let pc = r * Vector3::new(board.x, board.y, 0.0) + Vector3::new(-0.12, -0.08, 0.9);
        Point2::new(FX * pc.x / pc.z + CX, FX * pc.y / pc.z + CY)
    }

    fn board_points(cols: usize, rows: usize, square: f64) -> Vec<Point2<f64>> {
        (0..rows)
            .flat_map(|j| (0..cols).map(move |i| Point2::new(i as f64 * square, j as f64 * square)))
            .collect()
    }

    fn pixel_distance(a: Point2<f64>, b: Point2<f64>) -> f64 {
        (a - b).norm()
    }

    #[test]
    fn board_to_image_mapping_matches_projection() {
        let board = board_points(11, 7, 0.025);
        let image: Vec<_> = board.iter().map(|&p| project(p)).collect();

        let h = estimate_homography(&board, &image).expect("homography");
        let sample = Point2::new(0.137, 0.061);
        assert!(pixel_distance(h.apply(sample), project(sample)) < 1e-6);
        assert!((h.h[(2, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_maps_pixels_back_onto_the_board() {
        let board = board_points(4, 3, 0.04);
        let image: Vec<_> = board.iter().map(|&p| project(p)).collect();
        let h = estimate_homography(&board, &image).expect("homography");
        let back = h.inverse().expect("invertible");

        for (b, px) in board.iter().zip(&image) {
            assert!(pixel_distance(back.apply(*px), *b) < 1e-7);
        }
    }

    #[test]
    fn single_square_is_enough() {
        let square = board_points(2, 2, 0.03);
        let image: Vec<_> = square.iter().map(|&p| project(p)).collect();
        let h = estimate_homography(&square, &image).expect("homography");
        let center = Point2::new(0.015, 0.015);
        assert!(pixel_distance(h.apply(center), project(center)) < 1e-6);
    }

    #[test]
    fn too_few_or_unpaired_points_are_rejected() {
        let board = board_points(3, 1, 0.03);
        let image: Vec<_> = board.iter().map(|&p| project(p)).collect();
        assert!(estimate_homography(&board, &image).is_none());

        let board = board_points(2, 2, 0.03);
        assert!(estimate_homography(&board, &image).is_none());
    }
}
