//! Calibration persistence: two JSON arrays in a well-known directory.

use crate::camera::CalibrationParameters;
use crate::error::StoreError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const CAMERA_MATRIX_FILE: &str = "camera_matrix.json";
pub const DIST_COEFS_FILE: &str = "dist_coefs.json";
pub const DEFAULT_CALIBRATION_DIR: &str = "calibration";

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_err(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError + '_ {
    move |source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    }
}

fn write_value<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(json_err(path))?;
    fs::write(path, json).map_err(io_err(path))
}

fn read_value<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(StoreError::Missing(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&raw).map_err(json_err(path))
}

/// Write `camera_matrix.json` (3 rows of 3) and `dist_coefs.json` (5 values).
pub fn save_calibration(
    dir: impl AsRef<Path>,
    params: &CalibrationParameters,
) -> Result<(), StoreError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    write_value(&dir.join(CAMERA_MATRIX_FILE), &params.camera_matrix)?;
    write_value(&dir.join(DIST_COEFS_FILE), &params.dist_coefs)?;
    log::info!("calibration written to {}", dir.display());
    Ok(())
}

/// Load both arrays; either file missing is [`StoreError::Missing`].
pub fn load_calibration(dir: impl AsRef<Path>) -> Result<CalibrationParameters, StoreError> {
    let dir = dir.as_ref();

    let k_path = dir.join(CAMERA_MATRIX_FILE);
    let rows: Vec<Vec<f64>> = read_value(&k_path)?;
    if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
        return Err(StoreError::Shape {
            path: k_path,
            expected: "a 3x3 matrix",
            got: format!("{} rows", rows.len()),
        });
    }
    let mut camera_matrix = [[0.0; 3]; 3];
    for (dst, src) in camera_matrix.iter_mut().zip(&rows) {
        dst.copy_from_slice(src);
    }

    let d_path = dir.join(DIST_COEFS_FILE);
    let coefs: Vec<f64> = read_value(&d_path)?;
    let dist_coefs: [f64; 5] = coefs.as_slice().try_into().map_err(|_| StoreError::Shape {
        path: d_path.clone(),
        expected: "5 distortion coefficients",
        got: format!("{} values", coefs.len()),
    })?;

    Ok(CalibrationParameters::new(camera_matrix, dist_coefs))
}

/// Merge the `Camera.*` block into a JSON settings file, creating it if needed.
///
/// Other keys of an existing file are kept.
pub fn write_camera_settings(
    path: impl AsRef<Path>,
    params: &CalibrationParameters,
) -> Result<PathBuf, StoreError> {
    let path = path.as_ref();
    let mut settings: Map<String, Value> = if path.exists() {
        read_value(path)?
    } else {
        Map::new()
    };
    for (key, value) in params.to_camera_settings() {
        settings.insert(key, Value::from(value));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    write_value(path, &settings)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CalibrationParameters {
        CalibrationParameters::from_intrinsics(
            612.5,
            610.25,
            319.0,
            241.5,
            [-0.1, 0.02, 0.001, 0.0, -0.003],
        )
    }

    #[test]
    fn save_then_load_returns_same_parameters() {
        let dir = tempfile::tempdir().expect("tempdir");
        save_calibration(dir.path(), &params()).expect("save");
        assert!(dir.path().join(CAMERA_MATRIX_FILE).exists());
        assert!(dir.path().join(DIST_COEFS_FILE).exists());
        assert_eq!(params(), load_calibration(dir.path()).expect("load"));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_calibration(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)), "{err}");
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        save_calibration(dir.path(), &params()).expect("save");
        fs::write(dir.path().join(DIST_COEFS_FILE), "[0.1, 0.2]").expect("write");
        let err = load_calibration(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Shape { .. }), "{err}");
    }

    #[test]
    fn settings_merge_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orbslam.json");
        fs::write(&path, r#"{"Camera.fps": 30.0, "Camera.fx": 1.0}"#).expect("write");
        write_camera_settings(&path, &params()).expect("settings");

        let merged: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(Some(&Value::from(30.0)), merged.get("Camera.fps"));
        assert_eq!(Some(&Value::from(612.5)), merged.get("Camera.fx"));
        assert_eq!(10, merged.len());
    }
}
