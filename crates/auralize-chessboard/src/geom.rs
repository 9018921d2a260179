/// Absolute difference between two angles (radians), normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= std::f32::consts::PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis `axis_angle` (modulo π) and a directed
/// vector angle `vec_angle`, in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(std::f32::consts::PI - diff_abs)
}

/// Whether two undirected orientations are orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff = axis_vec_diff(reference_angle, other_angle);
    (std::f32::consts::FRAC_PI_2 - diff).abs() <= tolerance.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn angle_difference_wraps() {
        assert!((angle_diff_abs(0.1, 2.0 * PI - 0.1) - 0.2).abs() < 1e-5);
        assert!((angle_diff_abs(0.0, PI) - PI).abs() < 1e-5);
    }

    #[test]
    fn axis_difference_ignores_direction() {
        assert!(axis_vec_diff(FRAC_PI_4, FRAC_PI_4 + PI).abs() < 1e-5);
        assert!((axis_vec_diff(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn orthogonal_cases() {
        let tol = 1e-3;
        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        assert!(is_orthogonal(FRAC_PI_4, 3.0 * FRAC_PI_4, tol));
        // Orientations are modulo π.
        assert!(is_orthogonal(0.1, 0.1 + 1.5 * PI, tol));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
    }
}
