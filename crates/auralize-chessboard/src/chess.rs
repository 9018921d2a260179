//! ChESS corner candidates from `chess-corners`.

use crate::params::ChessParams;
use auralize_core::{Corner, GrayImageView};
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use log::{debug, warn};
use nalgebra::Point2;

/// Single-scale `chess-corners` configuration for `params`.
pub fn chess_config(params: &ChessParams) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = params.threshold_rel;
    cfg.params.nms_radius = params.nms_radius as _;
    cfg
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        orientation_cluster: None,
        strength: c.response,
    }
}

/// Detect ChESS corner candidates in a grayscale view.
pub fn detect_corners(src: &GrayImageView<'_>, params: &ChessParams) -> Vec<Corner> {
    let Some(img) =
        ::image::GrayImage::from_raw(src.width as u32, src.height as u32, src.data.to_vec())
    else {
        warn!(
            "gray buffer of {} bytes does not match {}x{}",
            src.data.len(),
            src.width,
            src.height
        );
        return Vec::new();
    };

    let corners: Vec<Corner> = find_chess_corners_image(&img, &chess_config(params))
        .iter()
        .map(adapt_chess_corner)
        .collect();
    debug!("ChESS: {} corner candidates", corners.len());
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use auralize_core::GrayImage;

    /// Checkerboard of `squares x squares` cells of `cell` px inside a white margin.
    fn checkerboard(squares: usize, cell: usize, margin: usize) -> GrayImage {
        let size = squares * cell + 2 * margin;
        let mut img = GrayImage::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let inside = (margin..size - margin).contains(&x) && (margin..size - margin).contains(&y);
                let dark = inside && ((x - margin) / cell + (y - margin) / cell) % 2 == 0;
                img.data[y * size + x] = if dark { 30 } else { 220 };
            }
        }
        img
    }

    #[test]
    fn inner_junctions_are_found() {
        let (squares, cell, margin) = (4, 20, 24);
        let img = checkerboard(squares, cell, margin);
        let corners = detect_corners(&img.view(), &ChessParams::default());

        for j in 1..squares {
            for i in 1..squares {
                let expected = Point2::new(
                    (margin + i * cell) as f32 - 0.5,
                    (margin + j * cell) as f32 - 0.5,
                );
                assert!(
                    corners
                        .iter()
                        .any(|c| (c.position - expected).norm() < 1.5),
                    "no corner near {expected:?} among {} candidates",
                    corners.len()
                );
            }
        }
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage {
            width: 48,
            height: 48,
            data: vec![128; 48 * 48],
        };
        assert!(detect_corners(&img.view(), &ChessParams::default()).is_empty());
    }

    #[test]
    fn truncated_buffer_yields_nothing() {
        let data = vec![0u8; 10];
        let view = GrayImageView {
            width: 32,
            height: 32,
            data: &data,
        };
        assert!(detect_corners(&view, &ChessParams::default()).is_empty());
    }
}
