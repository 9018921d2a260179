//! Position fusion: one bounding box plus one depth map gives a normalized
//! 3D position relative to the camera.
//!
//! ```
//! use auralize_core::{BoundingBox, DepthMap, Frame};
//! use auralize_fusion::PositionFusionEngine;
//!
//! let frame = Frame::filled(640, 480, 3, 0).unwrap();
//! let depth = DepthMap::constant(160, 120, 0.05);
//! let bbox = BoundingBox::new(0.0, 0.0, 480.0, 640.0);
//! let p = PositionFusionEngine::new().fuse(&frame, &bbox, &depth).unwrap();
//! assert_eq!((p.x, p.y), (0.0, 0.0));
//! assert_eq!(p.z, 0.05f32 as f64);
//! ```

mod engine;
mod error;
mod resample;

pub use engine::{PixelRegion, PositionFusionEngine};
pub use error::FusionError;
pub use resample::{resample_depth, sample_depth};
