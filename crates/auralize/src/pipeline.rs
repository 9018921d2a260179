//! Per-frame orchestration: undistort, detect, estimate depth, fuse, sonify.

use crate::collab::Collaborators;
use crate::config::PipelineConfig;
use crate::detector::{clamp_to_frame, DetectorConfig};
use crate::overlay::draw_box;
use auralize_calib::Undistorter;
use auralize_core::{Frame, Position3D};
use auralize_fusion::{FusionError, PositionFusionEngine};
use auralize_stream::{FramePoll, FrameSource};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Position forwarded to the audio sink.
    Located(Position3D),
    /// No box of the target class.
    NoDetection,
    /// The depth estimator had nothing for this frame.
    DepthUnavailable,
    /// Fusion rejected the box; handled like [`FrameOutcome::NoDetection`].
    FusionFailed(FusionError),
}

impl FrameOutcome {
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Located(_))
    }
}

/// Result of one loop iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum Tick {
    Processed(FrameOutcome),
    /// No new frame yet.
    Idle,
    /// The source ran out of frames.
    Exhausted,
}

/// Why [`FrameProcessingPipeline::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    Exhausted,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub located: u64,
    pub skipped: u64,
    pub stop: StopReason,
}

pub struct FrameProcessingPipeline {
    source: FrameSource,
    undistorter: Undistorter,
    collaborators: Collaborators,
    fusion: PositionFusionEngine,
    detector: DetectorConfig,
    target_class: u32,
    annotate: bool,
    stop: Arc<AtomicBool>,
}

impl FrameProcessingPipeline {
    pub fn new(
        source: FrameSource,
        undistorter: Undistorter,
        collaborators: Collaborators,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            undistorter,
            collaborators,
            fusion: PositionFusionEngine::new(),
            detector: config.detector.clone(),
            target_class: config.target_class,
            annotate: config.annotate,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends [`run`](Self::run) after the in-flight frame.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run one raw frame through every stage.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, raw), fields(frame = raw.index))
    )]
    pub fn process_frame(&mut self, raw: &Frame) -> FrameOutcome {
        let frame = self.undistorter.undistort(raw);
        let c = &mut self.collaborators;

        let candidates = c.detector.detect(&frame);
        let Some(target) = self.detector.select_target(&candidates, self.target_class) else {
            debug!(
                "frame {}: no class {} among {} candidates",
                frame.index,
                self.target_class,
                candidates.len()
            );
            c.display.show(&frame);
            return FrameOutcome::NoDetection;
        };

        if self.annotate {
            let outline = clamp_to_frame(&target, frame.width, frame.height);
            c.display.show(&draw_box(&frame, &outline, 2));
        } else {
            c.display.show(&frame);
        }

        let Some(depth) = c.depth.estimate(&frame) else {
            debug!("frame {}: depth unavailable", frame.index);
            return FrameOutcome::DepthUnavailable;
        };

        match self.fusion.fuse(&frame, &target, &depth) {
            Ok(position) => {
                debug!(
                    "frame {}: class {} (score {:.2}) at ({:.3}, {:.3}, {:.3})",
                    frame.index, target.class_id, target.score, position.x, position.y, position.z
                );
                c.audio.set_position(position);
                c.audio.play();
                FrameOutcome::Located(position)
            }
            Err(err) => {
                warn!("frame {}: {err}", frame.index);
                FrameOutcome::FusionFailed(err)
            }
        }
    }

    /// Pull at most one frame from the source and process it.
    pub fn tick(&mut self) -> Tick {
        match self.source.poll() {
            FramePoll::Ready(frame) => Tick::Processed(self.process_frame(&frame)),
            FramePoll::Empty => Tick::Idle,
            FramePoll::Exhausted => Tick::Exhausted,
        }
    }

    /// Loop until quit, exhaustion or the stop flag; then stop the source.
    pub fn run(&mut self) -> RunSummary {
        let mut frames = 0u64;
        let mut located = 0u64;
        let stop = loop {
            if self.stop.load(Ordering::Acquire) {
                break StopReason::Stopped;
            }
            match self.tick() {
                Tick::Processed(outcome) => {
                    frames += 1;
                    if outcome.is_located() {
                        located += 1;
                    }
                }
                Tick::Idle => std::thread::yield_now(),
                Tick::Exhausted => break StopReason::Exhausted,
            }
            if self.collaborators.display.quit_requested() {
                break StopReason::Quit;
            }
        };
        if !self.source.shutdown() {
            warn!("frame source did not shut down cleanly");
        }
        let summary = RunSummary {
            frames,
            located,
            skipped: frames - located,
            stop,
        };
        info!(
            "pipeline stopped ({:?}): {} frames, {} located",
            summary.stop, summary.frames, summary.located
        );
        summary
    }
}
