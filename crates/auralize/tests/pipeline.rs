use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use auralize::calib::{CalibrationParameters, UndistortParams, Undistorter};
use auralize::core::{BoundingBox, DepthMap, Frame, Position3D};
use auralize::fusion::FusionError;
use auralize::stream::{AcquisitionMode, FrameSource, MemoryOrigin, SourceParams};
use auralize::{
    load_startup_calibration, AudioSink, Collaborators, DepthEstimator, Display,
    FrameOutcome, FrameProcessingPipeline, ObjectDetector, PipelineConfig, StartupError,
    StopReason,
};

const W: usize = 640;
const H: usize = 480;

#[derive(Default)]
struct Recorded {
    positions: Vec<Position3D>,
    plays: usize,
    shown: usize,
}

type Shared = Rc<RefCell<Recorded>>;

/// Returns the boxes scripted for each frame index.
struct Scripted(Vec<Vec<BoundingBox>>);

impl ObjectDetector for Scripted {
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self.0.get(frame.index as usize).cloned().unwrap_or_default()
    }
}

struct Depth(Option<f32>);

impl DepthEstimator for Depth {
    fn estimate(&mut self, _frame: &Frame) -> Option<DepthMap> {
        self.0.map(|d| DepthMap::constant(W / 4, H / 4, d))
    }
}

struct Audio(Shared);

impl AudioSink for Audio {
    fn set_position(&mut self, position: Position3D) {
        self.0.borrow_mut().positions.push(position);
    }

    fn play(&mut self) {
        self.0.borrow_mut().plays += 1;
    }
}

struct Screen {
    state: Shared,
    quit_after: Option<usize>,
}

impl Display for Screen {
    fn show(&mut self, _frame: &Frame) {
        self.state.borrow_mut().shown += 1;
    }

    fn quit_requested(&mut self) -> bool {
        self.quit_after
            .is_some_and(|n| self.state.borrow().shown >= n)
    }
}

fn pinhole() -> CalibrationParameters {
    CalibrationParameters::from_intrinsics(500.0, 500.0, W as f64 / 2.0, H as f64 / 2.0, [0.0; 5])
}

fn full_box() -> BoundingBox {
    BoundingBox::new(0.0, 0.0, H as f32, W as f32).with_class(0, 0.9)
}

fn frames(n: usize) -> MemoryOrigin {
    MemoryOrigin::new((0..n).map(|_| Frame::filled(W, H, 3, 90).expect("frame")))
}

fn pipeline(
    n: usize,
    script: Vec<Vec<BoundingBox>>,
    depth: Option<f32>,
    quit_after: Option<usize>,
    mode: AcquisitionMode,
) -> (FrameProcessingPipeline, Shared) {
    let state = Shared::default();
    let config = PipelineConfig::default();
    let source =
        FrameSource::open(Box::new(frames(n)), mode, &SourceParams::default()).expect("source");
    let collaborators = Collaborators {
        detector: Box::new(Scripted(script)),
        depth: Box::new(Depth(depth)),
        audio: Box::new(Audio(state.clone())),
        display: Box::new(Screen {
            state: state.clone(),
            quit_after,
        }),
    };
    let undistorter = Undistorter::new(pinhole(), &UndistortParams::default());
    (
        FrameProcessingPipeline::new(source, undistorter, collaborators, &config),
        state,
    )
}

#[test]
fn centered_object_reaches_the_audio_sink() {
    let (mut p, state) = pipeline(
        1,
        vec![vec![full_box()]],
        Some(0.05),
        None,
        AcquisitionMode::Sequential,
    );
    let summary = p.run();
    assert_eq!((1, 1, 0), (summary.frames, summary.located, summary.skipped));
    assert_eq!(StopReason::Exhausted, summary.stop);

    let s = state.borrow();
    assert_eq!(vec![Position3D::new(0.0, 0.0, 0.05f32 as f64)], s.positions);
    assert_eq!(1, s.plays);
    assert_eq!(1, s.shown);
}

#[test]
fn frames_without_a_target_emit_no_audio() {
    let script = vec![
        vec![],
        vec![full_box().with_class(4, 0.9)],
        vec![full_box().with_class(0, 0.1)],
    ];
    let (mut p, state) = pipeline(3, script, Some(1.0), None, AcquisitionMode::Sequential);
    let summary = p.run();
    assert_eq!((3, 0, 3), (summary.frames, summary.located, summary.skipped));
    let s = state.borrow();
    assert!(s.positions.is_empty());
    assert_eq!(0, s.plays);
    assert_eq!(3, s.shown);
}

#[test]
fn per_frame_failures_do_not_stop_the_loop() {
    let degenerate = BoundingBox::new(10.0, 50.0, 200.0, 50.0).with_class(0, 0.9);
    let script = vec![vec![degenerate], vec![full_box()]];
    let (mut p, state) = pipeline(2, script, Some(2.0), None, AcquisitionMode::Sequential);

    let first = Frame::filled(W, H, 3, 0).expect("frame");
    assert!(matches!(
        p.process_frame(&first),
        FrameOutcome::FusionFailed(FusionError::EmptyRegion { .. })
    ));
    assert!(state.borrow().positions.is_empty());

    let summary = p.run();
    assert_eq!(2, summary.frames);
    assert_eq!(1, summary.located);
    assert_eq!(1, state.borrow().plays);
}

#[test]
fn missing_depth_skips_audio() {
    let (mut p, state) = pipeline(
        1,
        vec![vec![full_box()]],
        None,
        None,
        AcquisitionMode::Sequential,
    );
    let frame = Frame::filled(W, H, 3, 0).expect("frame");
    assert_eq!(FrameOutcome::DepthUnavailable, p.process_frame(&frame));
    assert_eq!(0, state.borrow().plays);
    assert_eq!(1, state.borrow().shown);
}

#[test]
fn quit_ends_the_loop_after_the_current_frame() {
    let (mut p, state) = pipeline(
        5,
        vec![vec![full_box()]; 5],
        Some(1.0),
        Some(2),
        AcquisitionMode::Sequential,
    );
    let summary = p.run();
    assert_eq!(StopReason::Quit, summary.stop);
    assert_eq!(2, summary.frames);
    assert_eq!(2, state.borrow().plays);
}

#[test]
fn stop_flag_ends_the_loop() {
    let (mut p, _state) = pipeline(3, vec![], Some(1.0), None, AcquisitionMode::Sequential);
    p.stop_handle().store(true, Ordering::Release);
    let summary = p.run();
    assert_eq!(StopReason::Stopped, summary.stop);
    assert_eq!(0, summary.frames);
}

#[test]
fn concurrent_source_runs_to_exhaustion() {
    let (mut p, state) = pipeline(
        6,
        vec![vec![full_box()]; 6],
        Some(1.0),
        None,
        AcquisitionMode::Concurrent,
    );
    let summary = p.run();
    assert_eq!(StopReason::Exhausted, summary.stop);
    assert!(summary.frames >= 1 && summary.frames <= 6);
    assert_eq!(summary.frames, summary.located);
    assert_eq!(summary.located as usize, state.borrow().plays);
}

#[test]
fn missing_calibration_is_a_startup_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_startup_calibration(dir.path()).expect_err("no calibration");
    assert!(matches!(err, StartupError::Calibration { .. }));
    assert!(err.to_string().contains("auralize-calibrate"));
}
