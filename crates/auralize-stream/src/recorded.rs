//! Recorded image sequences read frame by frame from disk.

use crate::error::SourceError;
use crate::origin::{FrameOrigin, ReadOutcome};
use auralize_core::Frame;
use image::DynamicImage;
use log::{debug, warn};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm"];

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// List image files for `pattern`: every image in a directory, or the matches
/// of a glob. The result is sorted lexicographically.
pub fn list_images(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let dir = Path::new(pattern);
    let mut paths = if dir.is_dir() {
        let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect::<Vec<_>>()
    } else {
        glob::glob(pattern)
            .map_err(|source| SourceError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!("skipping unreadable glob entry: {err}");
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect()
    };
    paths.sort();
    if paths.is_empty() {
        return Err(SourceError::Empty(pattern.to_string()));
    }
    Ok(paths)
}

/// Convert a decoded image: 8-bit luma stays single channel, images with
/// alpha become RGBA, everything else RGB.
pub fn frame_from_image(img: DynamicImage) -> Frame {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (channels, data) = match img {
        DynamicImage::ImageLuma8(gray) => (1, gray.into_raw()),
        other if other.color().has_alpha() => (4, other.into_rgba8().into_raw()),
        other => (3, other.into_rgb8().into_raw()),
    };
    Frame {
        width,
        height,
        channels,
        data,
        index: 0,
        captured_at: std::time::Instant::now(),
    }
}

/// Origin reading a sorted list of image files, one per `read`.
///
/// Files that fail to decode are logged and reported as transient failures.
#[derive(Debug)]
pub struct ImageSequenceOrigin {
    pending: VecDeque<PathBuf>,
    total: usize,
}

impl ImageSequenceOrigin {
    #[cfg_attr(feature = "tracing", instrument(level = "debug"))]
    pub fn open(pattern: &str) -> Result<Self, SourceError> {
        let paths = list_images(pattern)?;
        debug!("image sequence {pattern:?}: {} files", paths.len());
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            total: paths.len(),
            pending: paths.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl FrameOrigin for ImageSequenceOrigin {
    fn read(&mut self) -> ReadOutcome {
        let Some(path) = self.pending.pop_front() else {
            return ReadOutcome::Exhausted;
        };
        match image::open(&path) {
            Ok(img) if img.width() > 0 && img.height() > 0 => {
                ReadOutcome::Frame(frame_from_image(img))
            }
            Ok(_) => {
                warn!("{}: empty image", path.display());
                ReadOutcome::Retry
            }
            Err(err) => {
                warn!("{}: {err}", path.display());
                ReadOutcome::Retry
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "image sequence ({}/{} read)",
            self.total - self.pending.len(),
            self.total
        )
    }
}
