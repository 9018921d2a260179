use std::error::Error;
use std::path::{Path, PathBuf};

use auralize::calib::debug::{draw_corners, save_corner_overlay, save_undistorted};
use auralize::calib::{
    common_image_size, save_calibration, undistort, write_camera_settings, CalibrationEstimator,
    CalibrationParams, DEFAULT_CALIBRATION_DIR,
};
use auralize::core::{Frame, GrayImage};
use auralize::imageio::load_gray;
use auralize::stream::list_images;
use clap::Parser;
use log::{info, warn};

/// Calibrate a camera from chessboard images.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Calibration images (glob or directory).
    #[arg(default_value = "./calib_images/*.bmp")]
    images: String,

    /// Write corner and undistortion images into this directory.
    #[arg(long, num_args = 0..=1, default_missing_value = "./output/")]
    debug: Option<PathBuf>,

    /// Chessboard square size; sets the unit of the board poses.
    #[arg(long, default_value_t = 1.0)]
    square_size: f64,

    /// Worker threads for corner detection; 1 runs sequentially.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Inner corners per column.
    #[arg(long, default_value_t = 7)]
    rows: usize,

    /// Inner corners per row.
    #[arg(long, default_value_t = 11)]
    cols: usize,

    /// Output directory for camera_matrix.json and dist_coefs.json.
    #[arg(long, default_value = DEFAULT_CALIBRATION_DIR)]
    output: PathBuf,

    /// Also merge Camera.fx ... Camera.k3 into this JSON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// More log output; repeat for trace level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        auralize::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        if std::env::var_os("RUST_LOG").is_some() {
            let _ = env_logger::try_init();
        } else {
            let level = auralize::core::level_from_verbosity(verbose);
            let _ = auralize::core::init_with_level(level);
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let params = CalibrationParams::default()
        .with_pattern(args.rows, args.cols)
        .with_square_size(args.square_size)
        .with_threads(args.threads);
    let estimator = CalibrationEstimator::new(params)?;

    let mut stems = Vec::new();
    let mut images: Vec<GrayImage> = Vec::new();
    for path in list_images(&args.images)? {
        info!("processing {}", path.display());
        match load_gray(&path) {
            Ok(img) => {
                stems.push(file_stem(&path));
                images.push(img);
            }
            Err(err) => warn!("failed to load {}: {err}", path.display()),
        }
    }
    let image_size = common_image_size(&images)?;

    let detections = estimator.detect_all(&images)?;
    if let Some(dir) = &args.debug {
        for ((img, stem), detection) in images.iter().zip(&stems).zip(&detections) {
            let corners = detection.as_ref().map(|set| set.image_points.as_slice());
            let overlay = draw_corners(img, corners, args.cols);
            save_corner_overlay(dir, stem, &overlay)?;
            if detection.is_none() {
                warn!("{stem}: chessboard not found");
            }
        }
    }

    let result = estimator.estimate_from_detections(detections, image_size)?;
    let p = &result.parameters;
    println!("RMS: {:.6}", result.rms);
    println!("camera matrix:");
    for row in &p.camera_matrix {
        println!("  [{:>12.4} {:>12.4} {:>12.4}]", row[0], row[1], row[2]);
    }
    println!("distortion coefficients: {:?}", p.dist_coefs);
    for (&index, rms) in result.view_indices.iter().zip(&result.per_view_rms) {
        info!("{}: rms {:.4}", stems[index], rms);
    }

    save_calibration(&args.output, p)?;
    if let Some(path) = &args.settings {
        let written = write_camera_settings(path, p)?;
        info!("camera settings written to {}", written.display());
    }

    if let Some(dir) = &args.debug {
        for &index in &result.view_indices {
            let frame = Frame::from_gray(images[index].clone())?;
            save_undistorted(dir, &stems[index], &undistort(&frame, p))?;
        }
        info!("debug images written to {}", dir.display());
    }
    Ok(())
}
