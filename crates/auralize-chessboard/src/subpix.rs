//! Gradient-orthogonality subpixel refinement for saddle corners.
//!
//! For every sample `q` in a window around the current estimate `c`, the
//! image gradient `g(q)` is orthogonal to `q - c` when `c` is the true
//! corner. Solving the weighted least-squares system
//!
//! ```text
//! (Σ w g gᵀ) c = Σ w g gᵀ q
//! ```
//!
//! and iterating gives the refined position.

use crate::params::SubPixParams;
use auralize_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine a single corner; returns the input when the system is singular or
/// the estimate leaves the search window.
pub fn refine_corner(
    img: &GrayImageView<'_>,
    initial: Point2<f32>,
    params: &SubPixParams,
) -> Point2<f32> {
    let half = params.half_window as i32;
    if half == 0 {
        return initial;
    }
    let sigma2 = (half * half) as f32;
    let mut current = initial;

    for _ in 0..params.max_iters {
        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();

        for dy in -half..=half {
            for dx in -half..=half {
                let qx = current.x + dx as f32;
                let qy = current.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(img, qx + 1.0, qy) - sample_bilinear(img, qx - 1.0, qy));
                let gy = 0.5 * (sample_bilinear(img, qx, qy + 1.0) - sample_bilinear(img, qx, qy - 1.0));
                let w = (-((dx * dx + dy * dy) as f32) / sigma2).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b[0] += gxx * qx + gxy * qy;
                b[1] += gxy * qx + gyy * qy;
            }
        }

        let Some(inv) = a.try_inverse() else {
            return initial;
        };
        let next = inv * b;
        let next = Point2::new(next[0], next[1]);
        let step = (next - current).norm();
        current = next;

        if (current - initial).abs().max() > half as f32 {
            return initial;
        }
        if step < params.epsilon {
            break;
        }
    }

    current
}

pub fn refine_corners(
    img: &GrayImageView<'_>,
    corners: &mut [Point2<f32>],
    params: &SubPixParams,
) {
    for c in corners.iter_mut() {
        *c = refine_corner(img, *c, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use auralize_core::GrayImage;

    /// Anti-aliased X-junction at `(cx, cy)` rendered with 8x8 supersampling.
    fn saddle(size: usize, cx: f32, cy: f32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        let ss = 8;
        for y in 0..size {
            for x in 0..size {
                let mut acc = 0u32;
                for sy in 0..ss {
                    for sx in 0..ss {
                        let px = x as f32 - 0.5 + (sx as f32 + 0.5) / ss as f32;
                        let py = y as f32 - 0.5 + (sy as f32 + 0.5) / ss as f32;
                        let bright = (px < cx) == (py < cy);
                        acc += if bright { 220 } else { 30 };
                    }
                }
                img.data[y * size + x] = (acc / (ss * ss) as u32) as u8;
            }
        }
        img
    }

    #[test]
    fn converges_to_true_corner() {
        let img = saddle(41, 20.3, 19.6);
        let params = SubPixParams {
            epsilon: 0.001,
            ..Default::default()
        };
        let refined = refine_corner(&img.view(), Point2::new(21.0, 19.0), &params);
        assert_abs_diff_eq!(refined.x, 20.3, epsilon = 0.1);
        assert_abs_diff_eq!(refined.y, 19.6, epsilon = 0.1);
    }

    #[test]
    fn flat_patch_keeps_initial_position() {
        let img = GrayImage {
            width: 30,
            height: 30,
            data: vec![100; 900],
        };
        let p = Point2::new(15.0, 15.0);
        assert_eq!(p, refine_corner(&img.view(), p, &SubPixParams::default()));
    }
}
