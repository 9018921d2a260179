//! Per-frame lens distortion removal.

use crate::camera::CalibrationParameters;
use crate::params::UndistortParams;
use auralize_core::Frame;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Samples per side of the grid used to bound the undistorted image.
const RECT_GRID: usize = 9;

/// Pixel rectangle `x, y, width, height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Inner (all valid) and outer (all source pixels) rectangles of the
/// undistorted image, in normalized coordinates `(x0, y0, x1, y1)`.
fn undistorted_rectangles(
    params: &CalibrationParameters,
    width: usize,
    height: usize,
) -> ([f64; 4], [f64; 4]) {
    let mut outer = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    let mut inner = [f64::MIN, f64::MIN, f64::MAX, f64::MAX];
    let step_x = (width as f64 - 1.0) / (RECT_GRID - 1) as f64;
    let step_y = (height as f64 - 1.0) / (RECT_GRID - 1) as f64;

    for gy in 0..RECT_GRID {
        for gx in 0..RECT_GRID {
            let (x, y) = params
                .pixel_to_normalized(Point2::new(gx as f64 * step_x, gy as f64 * step_y));
            outer[0] = outer[0].min(x);
            outer[1] = outer[1].min(y);
            outer[2] = outer[2].max(x);
            outer[3] = outer[3].max(y);
            if gx == 0 {
                inner[0] = inner[0].max(x);
            }
            if gx == RECT_GRID - 1 {
                inner[2] = inner[2].min(x);
            }
            if gy == 0 {
                inner[1] = inner[1].max(y);
            }
            if gy == RECT_GRID - 1 {
                inner[3] = inner[3].min(y);
            }
        }
    }
    (inner, outer)
}

/// New camera matrix for undistorted images of `width x height`.
///
/// `alpha = 0` zooms in so every output pixel is valid; `alpha = 1` keeps
/// every source pixel. Also returns the all-valid region in the new image.
pub fn optimal_new_camera_matrix(
    params: &CalibrationParameters,
    width: usize,
    height: usize,
    alpha: f64,
) -> ([[f64; 3]; 3], Roi) {
    let alpha = alpha.clamp(0.0, 1.0);
    let (inner, outer) = undistorted_rectangles(params, width, height);
    let (w1, h1) = (width as f64 - 1.0, height as f64 - 1.0);

    let fx0 = w1 / (inner[2] - inner[0]);
    let fy0 = h1 / (inner[3] - inner[1]);
    let cx0 = -fx0 * inner[0];
    let cy0 = -fy0 * inner[1];

    let fx1 = w1 / (outer[2] - outer[0]);
    let fy1 = h1 / (outer[3] - outer[1]);
    let cx1 = -fx1 * outer[0];
    let cy1 = -fy1 * outer[1];

    let fx = fx0 * (1.0 - alpha) + fx1 * alpha;
    let fy = fy0 * (1.0 - alpha) + fy1 * alpha;
    let cx = cx0 * (1.0 - alpha) + cx1 * alpha;
    let cy = cy0 * (1.0 - alpha) + cy1 * alpha;

    let x0 = (inner[0] * fx + cx).ceil().max(0.0);
    let y0 = (inner[1] * fy + cy).ceil().max(0.0);
    let x1 = (inner[2] * fx + cx).floor().min(w1);
    let y1 = (inner[3] * fy + cy).floor().min(h1);
    let roi = Roi {
        x: x0 as usize,
        y: y0 as usize,
        width: (x1 - x0 + 1.0).max(0.0) as usize,
        height: (y1 - y0 + 1.0).max(0.0) as usize,
    };

    ([[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]], roi)
}

/// Precomputed source coordinates for every destination pixel.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    pub width: usize,
    pub height: usize,
    pub new_camera_matrix: [[f64; 3]; 3],
    pub roi: Roi,
    map: Vec<(f32, f32)>,
}

impl UndistortMap {
    pub fn new(params: &CalibrationParameters, width: usize, height: usize, alpha: f64) -> Self {
        let (new_k, roi) = optimal_new_camera_matrix(params, width, height, alpha);
        let (nfx, nfy, ncx, ncy) = (new_k[0][0], new_k[1][1], new_k[0][2], new_k[1][2]);

        let mut map = Vec::with_capacity(width * height);
        for v in 0..height {
            for u in 0..width {
                let x = (u as f64 - ncx) / nfx;
                let y = (v as f64 - ncy) / nfy;
                let src = params.normalized_to_pixel(x, y);
                map.push((src.x as f32, src.y as f32));
            }
        }

        Self {
            width,
            height,
            new_camera_matrix: new_k,
            roi,
            map,
        }
    }

    /// Remap a frame of this map's size; samples outside the source are black.
    pub fn apply(&self, frame: &Frame) -> Frame {
        let c = frame.channels;
        let mut data = vec![0u8; self.width * self.height * c];
        for (idx, &(sx, sy)) in self.map.iter().enumerate() {
            frame.sample_bilinear_into(sx, sy, &mut data[idx * c..(idx + 1) * c]);
        }
        frame.with_data(data)
    }
}

/// Undistorts frames, rebuilding its remap table only when the frame size
/// changes.
pub struct Undistorter {
    params: CalibrationParameters,
    alpha: f64,
    map: Option<UndistortMap>,
}

impl Undistorter {
    pub fn new(params: CalibrationParameters, undistort: &UndistortParams) -> Self {
        Self {
            params,
            alpha: undistort.alpha,
            map: None,
        }
    }

    pub fn params(&self) -> &CalibrationParameters {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn undistort(&mut self, frame: &Frame) -> Frame {
        let stale = self
            .map
            .as_ref()
            .is_none_or(|m| m.width != frame.width || m.height != frame.height);
        if stale {
            log::debug!(
                "building undistortion map for {}x{}",
                frame.width,
                frame.height
            );
            self.map = Some(UndistortMap::new(
                &self.params,
                frame.width,
                frame.height,
                self.alpha,
            ));
        }
        match &self.map {
            Some(map) => map.apply(frame),
            None => frame.clone(),
        }
    }
}

/// One-shot undistortion with the default `alpha = 1`.
pub fn undistort(frame: &Frame, params: &CalibrationParameters) -> Frame {
    UndistortMap::new(
        params,
        frame.width,
        frame.height,
        UndistortParams::default().alpha,
    )
    .apply(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CalibrationParameters {
        CalibrationParameters::from_intrinsics(
            200.0,
            200.0,
            79.5,
            59.5,
            [-0.25, 0.06, 0.001, -0.001, 0.0],
        )
    }

    fn gradient_frame() -> Frame {
        let (w, h) = (160, 120);
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 255 / w) as u8, (y * 255 / h) as u8, 77]);
            }
        }
        Frame::new(w, h, 3, data).expect("frame")
    }

    #[test]
    fn undistortion_is_deterministic() {
        let frame = gradient_frame();
        let a = undistort(&frame, &params());
        let b = undistort(&frame, &params());
        assert_eq!(a.data, b.data);
        assert_eq!((a.width, a.height, a.channels), (160, 120, 3));
    }

    #[test]
    fn zero_distortion_with_alpha_one_is_identity() {
        let p = CalibrationParameters::from_intrinsics(200.0, 200.0, 79.5, 59.5, [0.0; 5]);
        let frame = gradient_frame();
        let out = undistort(&frame, &p);
        let max_diff = out
            .data
            .iter()
            .zip(&frame.data)
            .map(|(a, b)| (*a as i32 - *b as i32).abs())
            .max()
            .unwrap_or(0);
        assert!(max_diff <= 1, "max diff {max_diff}");
    }

    #[test]
    fn alpha_one_keeps_all_source_pixels() {
        let p = params();
        let (k, _) = optimal_new_camera_matrix(&p, 160, 120, 1.0);
        // Every source corner must land inside the new image.
        for (u, v) in [(0.0, 0.0), (159.0, 0.0), (0.0, 119.0), (159.0, 119.0)] {
            let (x, y) = p.pixel_to_normalized(Point2::new(u, v));
            let nu = k[0][0] * x + k[0][2];
            let nv = k[1][1] * y + k[1][2];
            assert!((-0.5..=159.5).contains(&nu), "u = {nu}");
            assert!((-0.5..=119.5).contains(&nv), "v = {nv}");
        }
    }

    #[test]
    fn alpha_zero_roi_covers_whole_image() {
        let (_, roi) = optimal_new_camera_matrix(&params(), 160, 120, 0.0);
        assert!(roi.width >= 158 && roi.height >= 118, "{roi:?}");
    }

    #[test]
    fn undistorter_caches_per_size() {
        let mut undistorter = Undistorter::new(params(), &UndistortParams::default());
        let frame = gradient_frame();
        let a = undistorter.undistort(&frame);
        let b = undistorter.undistort(&frame);
        assert_eq!(a.data, b.data);
        assert_eq!(a.data, undistort(&frame, &params()).data);
    }
}
