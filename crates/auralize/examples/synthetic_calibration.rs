//! Render chessboards through a known camera, calibrate, and compare.
//!
//! `cargo run -p auralize --example synthetic_calibration [out_dir]` also
//! writes the calibration into `out_dir` when given.

use auralize::calib::synthetic::{standard_poses, BoardRenderer, SyntheticCamera};
use auralize::calib::{save_calibration, CalibrationEstimator, CalibrationParameters, CalibrationParams};

#[cfg(feature = "tracing")]
use auralize::init_tracing;

const ROWS: usize = 7;
const COLS: usize = 9;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    auralize::core::init_with_level(log::LevelFilter::Info)?;

    let truth = CalibrationParameters::from_intrinsics(
        420.0,
        415.0,
        236.0,
        183.0,
        [-0.12, 0.03, 0.0, 0.0, 0.0],
    );
    let camera = SyntheticCamera::new(truth, 480, 360);
    let renderer = BoardRenderer::new(&camera, 3);
    let images: Vec<_> = standard_poses(ROWS, COLS, 1.0, 16.0)
        .iter()
        .map(|pose| renderer.render(pose, ROWS, COLS, 1.0))
        .collect();

    let estimator = CalibrationEstimator::new(CalibrationParams::default().with_pattern(ROWS, COLS))?;
    let result = estimator.estimate(&images)?;
    let p = &result.parameters;
    println!(
        "{} views, rms {:.4} px",
        result.view_indices.len(),
        result.rms
    );
    println!(
        "fx {:.2} ({:.2})  fy {:.2} ({:.2})  cx {:.2} ({:.2})  cy {:.2} ({:.2})",
        p.fx(),
        truth.fx(),
        p.fy(),
        truth.fy(),
        p.cx(),
        truth.cx(),
        p.cy(),
        truth.cy()
    );
    println!("k1 {:.4}  k2 {:.4}", p.dist_coefs[0], p.dist_coefs[1]);

    if let Some(dir) = std::env::args().nth(1) {
        save_calibration(&dir, p)?;
        println!("written to {dir}");
    }
    Ok(())
}
