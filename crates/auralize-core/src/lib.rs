//! Core types and utilities for the auralize sensing pipeline.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete image decoder, detector model or capture backend.
//! Everything downstream (chessboard detection, calibration, frame sources,
//! fusion) exchanges data through the types defined here.

mod corner;
mod frame;
mod homography;
mod image;
mod logger;
mod types;

pub use corner::{Corner, GridCoords};
pub use frame::{Frame, FrameError};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use types::{BoundingBox, DepthMap, Position3D};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
