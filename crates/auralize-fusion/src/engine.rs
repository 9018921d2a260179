use crate::error::FusionError;
use crate::resample::sample_depth;
use auralize_core::{BoundingBox, DepthMap, Frame, Position3D};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Integer pixel region `[left, right) x [top, bottom)` inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRegion {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl PixelRegion {
    /// Round the box extents to whole pixels and clamp them to the frame.
    pub fn from_box(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        let clamp = |v: f32, max: usize| -> usize {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, max as f32) as usize
            }
        };
        Self {
            left: clamp(bbox.left, width),
            top: clamp(bbox.top, height),
            right: clamp(bbox.right, width),
            bottom: clamp(bbox.bottom, height),
        }
    }

    pub fn area(&self) -> usize {
        self.right.saturating_sub(self.left) * self.bottom.saturating_sub(self.top)
    }
}

/// Combines one detection with a depth map into a [`Position3D`].
///
/// `x` and `y` are the box center relative to the frame center, divided by
/// the frame size, so they lie in `[-0.5, 0.5]` for boxes inside the frame.
/// `z` is the mean depth over the box after resampling the depth map to the
/// frame resolution.
#[derive(Clone, Debug, Default)]
pub struct PositionFusionEngine;

impl PositionFusionEngine {
    pub fn new() -> Self {
        Self
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, depth), fields(frame = frame.index))
    )]
    pub fn fuse(
        &self,
        frame: &Frame,
        bbox: &BoundingBox,
        depth: &DepthMap,
    ) -> Result<Position3D, FusionError> {
        let (w, h) = (frame.width, frame.height);
        if w == 0 || h == 0 {
            return Err(FusionError::InvalidFrame {
                width: w,
                height: h,
            });
        }
        if depth.is_empty() || depth.data.is_empty() {
            return Err(FusionError::EmptyDepth);
        }
        if depth.data.len() != depth.width * depth.height {
            return Err(FusionError::InvalidDepth {
                width: depth.width,
                height: depth.height,
                len: depth.data.len(),
            });
        }

        let (cx, cy) = bbox.center();
        let x = (cx as f64 - w as f64 / 2.0) / w as f64;
        let y = (cy as f64 - h as f64 / 2.0) / h as f64;

        let region = PixelRegion::from_box(bbox, w, h);
        if region.area() == 0 {
            return Err(FusionError::EmptyRegion {
                left: region.left,
                right: region.right,
                top: region.top,
                bottom: region.bottom,
                width: w,
                height: h,
            });
        }

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for py in region.top..region.bottom {
            for px in region.left..region.right {
                let d = sample_depth(depth, px, py, w, h);
                if d.is_finite() {
                    sum += d as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Err(FusionError::EmptyDepth);
        }
        let z = sum / count as f64;
        debug!(
            "fused box {:?} over {} px: ({x:.3}, {y:.3}, {z:.3})",
            region, count
        );
        Ok(Position3D::new(x, y, z))
    }

    /// Like [`fuse`](Self::fuse), but for a detection that may be absent.
    pub fn fuse_detection(
        &self,
        frame: &Frame,
        bbox: Option<&BoundingBox>,
        depth: &DepthMap,
    ) -> Result<Position3D, FusionError> {
        let bbox = bbox.ok_or(FusionError::MissingBox)?;
        self.fuse(frame, bbox, depth)
    }
}
