use auralize_chessboard::{ChessboardParams, SubPixParams};
use serde::{Deserialize, Serialize};

/// Levenberg-Marquardt settings for the camera model refinement.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SolverParams {
    /// Evaluation budget per parameter, passed as the solver's patience.
    pub max_iters: usize,
    /// Stop when the relative cost decrease falls below this.
    pub ftol: f64,
    /// Stop when the relative step length falls below this.
    pub xtol: f64,
    /// Stop when the largest gradient component falls below this.
    pub gtol: f64,
    /// Initial step bound factor.
    pub stepbound: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-10,
            stepbound: 100.0,
        }
    }
}

/// Everything a calibration run needs besides the images.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CalibrationParams {
    /// Inner-corner grid and detector tunables; defaults to 7 rows x 11 columns.
    pub board: ChessboardParams,
    /// Side of one chessboard square in world units.
    pub square_size: f64,
    pub subpix: SubPixParams,
    /// Minimum number of images with a detected board.
    pub min_views: usize,
    /// Worker threads for corner detection; `<= 1` runs on the caller's thread.
    pub threads: usize,
    pub solver: SolverParams,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            board: ChessboardParams::default(),
            square_size: 1.0,
            subpix: SubPixParams::default(),
            min_views: 3,
            threads: 4,
            solver: SolverParams::default(),
        }
    }
}

impl CalibrationParams {
    pub fn with_pattern(mut self, rows: usize, cols: usize) -> Self {
        self.board.rows = rows;
        self.board.cols = cols;
        self
    }

    pub fn with_square_size(mut self, square_size: f64) -> Self {
        self.square_size = square_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UndistortParams {
    /// 0 keeps only valid pixels, 1 keeps every source pixel (black borders).
    pub alpha: f64,
}

impl Default for UndistortParams {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}
