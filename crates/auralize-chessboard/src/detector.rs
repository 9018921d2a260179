use crate::gridgraph::{assign_grid_coordinates, connected_components, GridGraph};
use crate::params::ChessboardParams;
use crate::chess::detect_corners;
use auralize_core::{Corner, GrayImageView, GridCoords};
use log::{debug, info};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A complete chessboard: `rows * cols` inner corners in row-major order
/// (`cols` corners per row).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChessboardDetection {
    pub rows: usize,
    pub cols: usize,
    pub corners: Vec<Point2<f32>>,
}

impl ChessboardDetection {
    pub fn corner(&self, i: usize, j: usize) -> Point2<f32> {
        self.corners[j * self.cols + i]
    }
}

/// Chessboard detector: ChESS corners, grid graph, full-grid acceptance.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Option<ChessboardDetection> {
        let corners = detect_corners(img, &self.params.chess);
        self.detect_from_corners(&corners)
    }

    /// Find the board in a cloud of corner candidates.
    ///
    /// Succeeds only when one connected component covers every inner corner.
    pub fn detect_from_corners(&self, corners: &[Corner]) -> Option<ChessboardDetection> {
        let (rows, cols) = (self.params.rows, self.params.cols);
        let expected = rows * cols;
        if rows < 2 || cols < 2 || corners.len() < expected {
            debug!(
                "{} corner candidates, need at least {}",
                corners.len(),
                expected
            );
            return None;
        }

        let graph = GridGraph::new(corners, &self.params.graph);
        let components = connected_components(&graph);
        let largest = components.iter().map(Vec::len).max().unwrap_or(0);
        info!(
            "{} candidates, {} components, largest {} (need {})",
            corners.len(),
            components.len(),
            largest,
            expected
        );

        components
            .iter()
            .filter(|c| c.len() == expected)
            .find_map(|component| {
                let coords = assign_grid_coordinates(&graph, component)?;
                let coords = orient_to_pattern(coords, rows, cols)?;
                let mut ordered = vec![Point2::origin(); expected];
                for (idx, g) in coords {
                    ordered[g.j as usize * cols + g.i as usize] = corners[idx].position;
                }
                Some(ChessboardDetection {
                    rows,
                    cols,
                    corners: ordered,
                })
            })
    }
}

/// Bring grid coordinates to extents `(cols, rows)`.
///
/// A board seen rotated by a quarter turn comes out of the BFS transposed;
/// it is rotated back (not mirrored) so the pattern keeps its handedness.
fn orient_to_pattern(
    coords: Vec<(usize, GridCoords)>,
    rows: usize,
    cols: usize,
) -> Option<Vec<(usize, GridCoords)>> {
    let width = coords.iter().map(|(_, c)| c.i).max()? as usize + 1;
    let height = coords.iter().map(|(_, c)| c.j).max()? as usize + 1;

    if (width, height) == (cols, rows) {
        return Some(coords);
    }
    if (width, height) == (rows, cols) {
        let max_i = width as i32 - 1;
        return Some(
            coords
                .into_iter()
                .map(|(idx, c)| {
                    (
                        idx,
                        GridCoords {
                            i: c.j,
                            j: max_i - c.i,
                        },
                    )
                })
                .collect(),
        );
    }
    debug!("component extents {width}x{height} do not match {cols}x{rows}");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use auralize_core::GrayImage;
    use std::f32::consts::FRAC_PI_4;

    fn synthetic_corners(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                corners.push(Corner {
                    position: Point2::new(30.0 + i as f32 * spacing, 40.0 + j as f32 * spacing),
                    orientation: if (i + j) % 2 == 0 {
                        FRAC_PI_4
                    } else {
                        3.0 * FRAC_PI_4
                    },
                    orientation_cluster: None,
                    strength: 1.0,
                });
            }
        }
        corners
    }

    /// Axis-aligned chessboard with `squares_x * squares_y` squares.
    fn render_board(squares_x: usize, squares_y: usize, square: usize, margin: usize) -> GrayImage {
        let w = squares_x * square + 2 * margin;
        let h = squares_y * square + 2 * margin;
        let mut img = GrayImage {
            width: w,
            height: h,
            data: vec![255; w * h],
        };
        for y in margin..margin + squares_y * square {
            for x in margin..margin + squares_x * square {
                let sx = (x - margin) / square;
                let sy = (y - margin) / square;
                if (sx + sy) % 2 == 0 {
                    img.data[y * w + x] = 0;
                }
            }
        }
        img
    }

    #[test]
    fn complete_grid_is_ordered_row_major() {
        let corners = synthetic_corners(5, 3, 20.0);
        let detector = ChessboardDetector::new(ChessboardParams::new(3, 5));
        let det = detector.detect_from_corners(&corners).expect("detection");
        assert_eq!(15, det.corners.len());
        assert!((det.corner(0, 0) - Point2::new(30.0, 40.0)).norm() < 1e-6);
        assert!((det.corner(4, 2) - Point2::new(110.0, 80.0)).norm() < 1e-6);
    }

    #[test]
    fn transposed_grid_is_rotated_back() {
        // Board seen rotated: 3 columns by 5 rows in the image.
        let corners = synthetic_corners(3, 5, 20.0);
        let detector = ChessboardDetector::new(ChessboardParams::new(3, 5));
        let det = detector.detect_from_corners(&corners).expect("detection");
        assert_eq!((3, 5), (det.rows, det.cols));
        // A quarter turn: the first row runs down the image's right column.
        assert!((det.corner(0, 0) - Point2::new(70.0, 40.0)).norm() < 1e-6);
        assert!((det.corner(1, 0) - Point2::new(70.0, 60.0)).norm() < 1e-6);
        assert!((det.corner(0, 1) - Point2::new(50.0, 40.0)).norm() < 1e-6);
    }

    #[test]
    fn incomplete_grid_is_rejected() {
        let mut corners = synthetic_corners(5, 3, 20.0);
        corners.remove(7);
        let detector = ChessboardDetector::new(ChessboardParams::new(3, 5));
        assert!(detector.detect_from_corners(&corners).is_none());
    }

    #[test]
    fn detects_rendered_board() {
        // 6x4 squares -> 5x3 inner corners.
        let img = render_board(6, 4, 24, 30);
        let detector = ChessboardDetector::new(ChessboardParams::new(3, 5));
        let det = detector.detect(&img.view()).expect("board found");
        // Inner corner (i, j) sits at margin + (i + 1) * square - 0.5.
        for j in 0..3 {
            for i in 0..5 {
                let expected = Point2::new(
                    30.0 + (i + 1) as f32 * 24.0 - 0.5,
                    30.0 + (j + 1) as f32 * 24.0 - 0.5,
                );
                let got = det.corner(i, j);
                assert!(
                    (got - expected).norm() < 1.5,
                    "corner ({i},{j}): {got:?} vs {expected:?}"
                );
            }
        }
    }

    #[test]
    fn blank_image_has_no_board() {
        let img = GrayImage {
            width: 120,
            height: 90,
            data: vec![200; 120 * 90],
        };
        let detector = ChessboardDetector::new(ChessboardParams::new(3, 5));
        assert!(detector.detect(&img.view()).is_none());
    }
}
