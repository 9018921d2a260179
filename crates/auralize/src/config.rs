//! Run configuration of the live pipeline.

use crate::detector::DetectorConfig;
use auralize_calib::{UndistortParams, DEFAULT_CALIBRATION_DIR};
use auralize_stream::SourceParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_calibration_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CALIBRATION_DIR)
}

fn default_annotate() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding `camera_matrix.json` and `dist_coefs.json`.
    #[serde(default = "default_calibration_dir")]
    pub calibration_dir: PathBuf,
    /// Class id the detector is searching for.
    #[serde(default)]
    pub target_class: u32,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub undistort: UndistortParams,
    #[serde(default)]
    pub source: SourceParams,
    /// Draw the located box on displayed frames.
    #[serde(default = "default_annotate")]
    pub annotate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration_dir: default_calibration_dir(),
            target_class: 0,
            detector: DetectorConfig::default(),
            undistort: UndistortParams::default(),
            source: SourceParams::default(),
            annotate: default_annotate(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
