//! Chessboard detection for camera calibration.
//!
//! Pipeline:
//! 1. ChESS corner candidates with their bright-diagonal orientation, from
//!    the `chess-corners` crate.
//! 2. Grid graph: for each corner, at most one neighbor per direction
//!    (right/left/up/down). Neighbors must have an orthogonal diagonal and
//!    sit at ~45° to both diagonals. Only mutual edges are kept.
//! 3. BFS each connected component and assign integer coordinates `(i, j)`.
//! 4. Accept the component that fills the full `cols x rows` grid; rotate a
//!    transposed component back to the pattern orientation.
//! 5. Optional gradient-based subpixel refinement ([`refine_corners`]).
//!
//! ```
//! use auralize_chessboard::{ChessboardDetector, ChessboardParams};
//! use auralize_core::GrayImage;
//!
//! let img = GrayImage::new(64, 48);
//! let detector = ChessboardDetector::new(ChessboardParams::new(7, 11));
//! assert!(detector.detect(&img.view()).is_none());
//! ```

mod chess;
mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{
    assign_grid_coordinates, connected_components, GridGraph, GridLink, NeighborDirection,
};
pub use params::{ChessParams, ChessboardParams, GridGraphParams, SubPixParams};
pub use chess::{chess_config, detect_corners};
pub use subpix::{refine_corner, refine_corners};
