use std::error::Error;
use std::path::PathBuf;

use auralize::calib::Undistorter;
use auralize::replay::{ConstantDepth, HeadlessDisplay, LoggingAudioSink, RecordedDepth, ReplayDetector};
use auralize::stream::{AcquisitionMode, FrameSource};
use auralize::{
    load_startup_calibration, Collaborators, DataSource, DepthEstimator, FrameProcessingPipeline,
    PipelineConfig, StartupError,
};
use clap::Parser;
use log::info;

/// Locate a target object in camera frames and emit its position as sound.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Data source: `cam`, `cam:<index>`, or a directory / glob of frames.
    #[arg(short = 's', long = "source")]
    source: String,

    /// JSON run configuration; defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with camera_matrix.json and dist_coefs.json.
    #[arg(long)]
    calibration_dir: Option<PathBuf>,

    /// Class id to search for.
    #[arg(long)]
    target_class: Option<u32>,

    /// Recorded detections, one JSON array of boxes per frame.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Recorded depth maps (directory or glob), one image per frame.
    #[arg(long, conflicts_with = "constant_depth")]
    depth: Option<String>,

    /// Multiplier from depth image intensity in [0, 1] to depth.
    #[arg(long, default_value_t = 1.0)]
    depth_scale: f32,

    /// Use the same depth for every pixel instead of recorded maps.
    #[arg(long)]
    constant_depth: Option<f32>,

    /// Append located positions to this JSON-lines file.
    #[arg(long)]
    positions: Option<PathBuf>,

    /// Save every displayed frame as PNG into this directory.
    #[arg(long)]
    save_frames: Option<PathBuf>,

    /// Read frames on a background thread, keeping only the newest.
    #[arg(long, conflicts_with = "sequential")]
    concurrent: bool,

    /// Read every frame in order on the main loop.
    #[arg(long)]
    sequential: bool,

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

fn depth_estimator(args: &Args) -> Result<Box<dyn DepthEstimator>, StartupError> {
    if let Some(pattern) = &args.depth {
        return Ok(Box::new(RecordedDepth::open(pattern, args.depth_scale)?));
    }
    if let Some(value) = args.constant_depth {
        return Ok(Box::new(ConstantDepth { value }));
    }
    Err(StartupError::Collaborator {
        what: "depth estimator",
        reason: "pass --depth <maps> or --constant-depth <z>".to_string(),
    })
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

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_json(path).map_err(StartupError::from)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.calibration_dir {
        config.calibration_dir = dir.clone();
    }
    if let Some(class) = args.target_class {
        config.target_class = class;
    }
    config.detector.validate().map_err(StartupError::from)?;

    let params = load_startup_calibration(&config.calibration_dir)?;
    info!(
        "calibration: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        params.fx(),
        params.fy(),
        params.cx(),
        params.cy()
    );

    let data_source: DataSource = args.source.parse()?;
    let mode = if args.concurrent {
        AcquisitionMode::Concurrent
    } else if args.sequential {
        AcquisitionMode::Sequential
    } else {
        data_source.default_mode()
    };
    let origin = data_source.open_origin()?;
    let source = FrameSource::open(origin, mode, &config.source).map_err(StartupError::from)?;

    let detector = match &args.detections {
        Some(path) => ReplayDetector::load(path).map_err(|e| StartupError::Collaborator {
            what: "object detector",
            reason: e.to_string(),
        })?,
        None => {
            return Err(StartupError::Collaborator {
                what: "object detector",
                reason: "no detector model runtime in this build; pass --detections <json>"
                    .to_string(),
            }
            .into())
        }
    };
    let audio = match &args.positions {
        Some(path) => LoggingAudioSink::with_output(path).map_err(|e| StartupError::Collaborator {
            what: "audio sink",
            reason: e.to_string(),
        })?,
        None => LoggingAudioSink::new(),
    };
    let mut display = HeadlessDisplay::with_stdin_quit();
    if let Some(dir) = &args.save_frames {
        display = display.save_frames_to(dir);
    }
    let collaborators = Collaborators {
        detector: Box::new(detector),
        depth: depth_estimator(&args)?,
        audio: Box::new(audio),
        display: Box::new(display),
    };

    let undistorter = Undistorter::new(params, &config.undistort);
    let mut pipeline = FrameProcessingPipeline::new(source, undistorter, collaborators, &config);
    info!("running on {data_source} ({mode:?}); enter `q` to quit");
    let summary = pipeline.run();
    println!(
        "{} frames, {} located, {} skipped ({:?})",
        summary.frames, summary.located, summary.skipped, summary.stop
    );
    Ok(())
}
