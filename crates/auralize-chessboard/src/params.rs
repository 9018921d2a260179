use serde::{Deserialize, Serialize};

/// Settings forwarded to the `chess-corners` detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChessParams {
    /// Keep peaks whose response exceeds `threshold_rel * max_response`.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 8.0,
            max_spacing_pix: 250.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChessboardParams {
    /// Number of *inner* corners in vertical direction.
    pub rows: usize,
    /// Number of *inner* corners in horizontal direction.
    pub cols: usize,
    pub chess: ChessParams,
    pub graph: GridGraphParams,
}

impl ChessboardParams {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            rows: 7,
            cols: 11,
            chess: ChessParams::default(),
            graph: GridGraphParams::default(),
        }
    }
}

/// Iterative subpixel refinement settings.
///
/// Iteration stops after `max_iters` steps or once a step moves the corner by
/// less than `epsilon` pixels, whichever happens first.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubPixParams {
    /// Half size of the search window; the window is `(2w+1) x (2w+1)`.
    pub half_window: usize,
    pub max_iters: usize,
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.1,
        }
    }
}
