use crate::config::ConfigIoError;
use crate::detector::ConfigError;
use auralize_calib::StoreError;
use auralize_stream::SourceError;
use std::path::PathBuf;

/// Conditions that stop the pipeline before its first frame.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("calibration parameters unavailable in {}; run auralize-calibrate first ({source})", dir.display())]
    Calibration {
        dir: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("invalid data source {0:?}: expected `cam`, `cam:<index>` or a path")]
    InvalidSource(String),

    #[error("camera {index} requested, but this build has no capture backend; pass a recorded sequence instead")]
    NoCaptureBackend { index: u32 },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Detector(#[from] ConfigError),

    #[error(transparent)]
    Config(#[from] ConfigIoError),

    #[error("failed to set up {what}: {reason}")]
    Collaborator { what: &'static str, reason: String },
}
