//! Diagnostic images: detected corners and undistorted results.

use crate::error::CalibrationError;
use auralize_core::{Frame, GrayImage};
use image::{DynamicImage, GrayImage as LumaImage, Rgb, RgbImage, RgbaImage};
use nalgebra::Point2;
use std::path::{Path, PathBuf};

/// Row colors for a found board, cycled per row.
const ROW_COLORS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [255, 128, 0],
    [200, 200, 0],
    [0, 255, 0],
    [0, 200, 255],
    [255, 0, 255],
];
const NOT_FOUND: [u8; 3] = [255, 0, 0];

fn put(img: &mut RgbImage, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Rgb(color));
    }
}

fn draw_line(img: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: [u8; 3]) {
    let steps = (b - a).abs().max().ceil().max(1.0) as usize;
    for s in 0..=steps {
        let p = a + (b - a) * (s as f64 / steps as f64);
        put(img, p.x.round() as i64, p.y.round() as i64, color);
    }
}

fn draw_marker(img: &mut RgbImage, p: Point2<f64>, radius: i64, color: [u8; 3]) {
    let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
    for d in -radius..=radius {
        put(img, cx + d, cy + d, color);
        put(img, cx + d, cy - d, color);
    }
    let r2 = (radius * radius) as f64;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f64;
            if (d2 - r2).abs() <= radius as f64 {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}

/// RGB copy of `gray` with corners drawn: colored per row and chained when
/// the board was found, nothing but the image otherwise.
pub fn draw_corners(gray: &GrayImage, corners: Option<&[Point2<f64>]>, cols: usize) -> RgbImage {
    let mut img = RgbImage::from_fn(gray.width as u32, gray.height as u32, |x, y| {
        let v = gray.data[y as usize * gray.width + x as usize];
        Rgb([v, v, v])
    });
    let Some(corners) = corners else {
        return img;
    };
    let cols = cols.max(1);
    let mut prev: Option<Point2<f64>> = None;
    for (k, &p) in corners.iter().enumerate() {
        let color = ROW_COLORS[(k / cols) % ROW_COLORS.len()];
        if let Some(q) = prev {
            draw_line(&mut img, q, p, color);
        }
        draw_marker(&mut img, p, 4, color);
        prev = Some(p);
    }
    img
}

/// Marks candidate positions of a failed detection in red.
pub fn draw_candidates(gray: &GrayImage, candidates: &[Point2<f64>]) -> RgbImage {
    let mut img = draw_corners(gray, None, 1);
    for &p in candidates {
        draw_marker(&mut img, p, 3, NOT_FOUND);
    }
    img
}

/// Convert a frame into an `image` buffer for encoding.
pub fn frame_to_image(frame: &Frame) -> Option<DynamicImage> {
    let (w, h) = (frame.width as u32, frame.height as u32);
    let data = frame.data.clone();
    match frame.channels {
        1 => LumaImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        _ => None,
    }
}

fn ensure_dir(dir: &Path) -> Result<(), CalibrationError> {
    std::fs::create_dir_all(dir).map_err(|source| CalibrationError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `<stem>_chess.png` into `dir`.
pub fn save_corner_overlay(
    dir: &Path,
    stem: &str,
    overlay: &RgbImage,
) -> Result<PathBuf, CalibrationError> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{stem}_chess.png"));
    overlay.save(&path)?;
    Ok(path)
}

/// Write `<stem>_undistorted.png` into `dir`.
pub fn save_undistorted(dir: &Path, stem: &str, frame: &Frame) -> Result<PathBuf, CalibrationError> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{stem}_undistorted.png"));
    let img = frame_to_image(frame).ok_or_else(|| {
        CalibrationError::InvalidParams(format!(
            "cannot encode a {}-channel frame",
            frame.channels
        ))
    })?;
    img.save(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_board_is_drawn_in_color() {
        let gray = GrayImage {
            width: 40,
            height: 30,
            data: vec![90; 1200],
        };
        let corners = [Point2::new(10.0, 10.0), Point2::new(20.0, 10.0)];
        let img = draw_corners(&gray, Some(&corners), 2);
        let px = img.get_pixel(15, 10);
        assert_eq!(&Rgb(ROW_COLORS[0]), px);
        assert_eq!(&Rgb([90, 90, 90]), img.get_pixel(0, 29));
    }

    #[test]
    fn overlays_are_written_as_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gray = GrayImage::new(16, 12);
        let path =
            save_corner_overlay(dir.path(), "view01", &draw_corners(&gray, None, 1)).expect("save");
        assert!(path.ends_with("view01_chess.png"));
        assert!(path.exists());

        let frame = Frame::from_gray(gray).expect("frame");
        let path = save_undistorted(dir.path(), "view01", &frame).expect("save");
        assert!(path.exists());
    }
}
