use std::path::PathBuf;

/// Failure of a calibration run. Never fatal to a live pipeline.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("only {found} of {total} images yielded a chessboard, need at least {required}")]
    TooFewDetections {
        found: usize,
        total: usize,
        required: usize,
    },

    #[error("image {index} is {got:?}, expected {expected:?} like the rest of the set")]
    InconsistentImageSize {
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("views are degenerate for intrinsics initialisation: {0}")]
    DegenerateViews(&'static str),

    #[error("camera model solve did not converge (cost {cost:e} after {iterations} iterations)")]
    SolverDiverged { iterations: usize, cost: f64 },

    #[error("invalid calibration parameters: {0}")]
    InvalidParams(String),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Reading or writing persisted calibration arrays.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("calibration file {} not found; run calibration first", .0.display())]
    Missing(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} holds {got}, expected {expected}", path.display())]
    Shape {
        path: PathBuf,
        expected: &'static str,
        got: String,
    },
}
