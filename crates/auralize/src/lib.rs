//! High-level facade for the `auralize-*` workspace.
//!
//! The live pipeline turns camera frames into a spatial sound cue for one
//! target object:
//!
//! 1. a [`FrameSource`](stream::FrameSource) delivers frames, either every
//!    frame of a recording or the newest frame of a live camera;
//! 2. the [`Undistorter`](calib::Undistorter) removes lens distortion using
//!    parameters produced offline by `auralize-calibrate`;
//! 3. an [`ObjectDetector`] proposes boxes and [`DetectorConfig`] picks the
//!    most confident box of the target class;
//! 4. a [`DepthEstimator`] provides a depth map, which the
//!    [`PositionFusionEngine`](fusion::PositionFusionEngine) combines with
//!    the box into a normalized `(x, y, z)`;
//! 5. the position goes to the [`AudioSink`].
//!
//! A frame without a detection, depth or usable region is shown and skipped;
//! only startup problems (for example missing calibration) are fatal.
//!
//! ## API map
//! - `auralize::core`: frames, depth maps, boxes, positions, logging.
//! - `auralize::chessboard`: ChESS corners and chessboard grid detection.
//! - `auralize::calib`: calibration, persistence and undistortion.
//! - `auralize::stream`: frame origins and acquisition modes.
//! - `auralize::fusion`: box and depth fusion.
//! - `auralize::replay` (feature `image`): recorded collaborators.

pub use auralize_calib as calib;
pub use auralize_chessboard as chessboard;
pub use auralize_core as core;
pub use auralize_fusion as fusion;
pub use auralize_stream as stream;

mod collab;
mod config;
mod detector;
mod error;
mod overlay;
mod pipeline;
mod source;

#[cfg(feature = "image")]
pub mod imageio;
#[cfg(feature = "image")]
pub mod replay;

pub use collab::{AudioSink, Collaborators, DepthEstimator, Display, ObjectDetector};
pub use config::{ConfigIoError, PipelineConfig};
pub use detector::{
    clamp_to_frame, iou, letterbox, ConfigError, DetectorConfig, Letterboxed, INPUT_STRIDE,
    LETTERBOX_FILL,
};
pub use error::StartupError;
pub use overlay::{draw_box, BOX_COLOR};
pub use pipeline::{FrameOutcome, FrameProcessingPipeline, RunSummary, StopReason, Tick};
pub use source::DataSource;

use auralize_calib::{load_calibration, CalibrationParameters};
use std::path::Path;

/// Load the calibration the pipeline cannot run without.
pub fn load_startup_calibration(dir: impl AsRef<Path>) -> Result<CalibrationParameters, StartupError> {
    let dir = dir.as_ref();
    load_calibration(dir).map_err(|source| StartupError::Calibration {
        dir: dir.to_path_buf(),
        source,
    })
}

/// Install the `tracing` subscriber and route `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    auralize_core::init_tracing(json);
    // No-op when the subscriber already bridged `log`.
    let _ = tracing_log::LogTracer::init();
}
