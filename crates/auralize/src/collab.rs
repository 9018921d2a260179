//! Collaborators the pipeline drives but does not implement.

use auralize_core::{BoundingBox, DepthMap, Frame, Position3D};

/// Object detector run on each undistorted frame.
pub trait ObjectDetector {
    /// Every detection in frame pixel coordinates, with class and score.
    /// Thresholding and target selection happen in the pipeline.
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox>;
}

/// Monocular depth estimator.
pub trait DepthEstimator {
    /// Depth map at any resolution; `None` when no estimate is available
    /// for this frame.
    fn estimate(&mut self, frame: &Frame) -> Option<DepthMap>;
}

/// Spatial audio output. Both calls must be safe to repeat every frame.
pub trait AudioSink {
    fn set_position(&mut self, position: Position3D);
    fn play(&mut self);
}

/// Display surface, also the source of the interactive quit signal.
pub trait Display {
    fn show(&mut self, frame: &Frame);

    /// Polled once per frame.
    fn quit_requested(&mut self) -> bool {
        false
    }
}

/// The four collaborators of a [`FrameProcessingPipeline`](crate::FrameProcessingPipeline).
pub struct Collaborators {
    pub detector: Box<dyn ObjectDetector>,
    pub depth: Box<dyn DepthEstimator>,
    pub audio: Box<dyn AudioSink>,
    pub display: Box<dyn Display>,
}
