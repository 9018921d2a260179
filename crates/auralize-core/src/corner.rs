use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A raw saddle-point corner candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Position in image pixels (pixel centers at integer coordinates).
    pub position: Point2<f32>,
    /// Direction of the bright diagonal, radians in `[0, π)`.
    pub orientation: f32,
    /// Orientation cluster label (0 or 1) once assigned, `None` for outliers.
    pub orientation_cluster: Option<usize>,
    /// Detector response; larger is stronger.
    pub strength: f32,
}

/// Integer grid coordinates of a corner inside a detected board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}
