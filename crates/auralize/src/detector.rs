//! Object detector configuration and detection post-processing.
//!
//! The network itself lives behind [`ObjectDetector`](crate::ObjectDetector);
//! this module holds what surrounds it: model file locations, thresholds,
//! input preparation (letterboxing), non-maximum suppression and the choice
//! of the single target box handed to fusion.

use auralize_core::{BoundingBox, Frame};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Gray level of the letterbox padding.
pub const LETTERBOX_FILL: u8 = 128;

/// Network input sizes must be multiples of this.
pub const INPUT_STRIDE: u32 = 32;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("model input size {width}x{height} must be positive multiples of {INPUT_STRIDE}")]
    InputSize { width: u32, height: u32 },

    #[error("{name} must lie in [0, 1], got {value}")]
    Threshold { name: &'static str, value: f32 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid anchors in {}: {reason}", path.display())]
    Anchors { path: PathBuf, reason: String },
}

/// Immutable detector settings, passed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub anchors_path: PathBuf,
    pub classes_path: PathBuf,
    /// Candidates below this confidence are discarded.
    pub score_threshold: f32,
    /// Overlap above which the weaker of two same-class boxes is suppressed.
    pub iou_threshold: f32,
    /// `(width, height)` of the network input; `None` keeps the frame size
    /// truncated to multiples of 32.
    pub model_image_size: Option<(u32, u32)>,
    pub gpu_num: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("keras_yolo3/model_data/tiny_yolo_ycb.h5"),
            anchors_path: PathBuf::from("keras_yolo3/model_data/tiny_yolo_anchors.txt"),
            classes_path: PathBuf::from("keras_yolo3/model_data/ycb_classes.txt"),
            score_threshold: 0.3,
            iou_threshold: 0.45,
            model_image_size: Some((416, 416)),
            gpu_num: 1,
        }
    }
}

impl DetectorConfig {
    /// Copy with every file path placed under `prefix`.
    pub fn with_path_prefix(&self, prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            model_path: prefix.join(&self.model_path),
            anchors_path: prefix.join(&self.anchors_path),
            classes_path: prefix.join(&self.classes_path),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((width, height)) = self.model_image_size {
            if width == 0 || height == 0 || width % INPUT_STRIDE != 0 || height % INPUT_STRIDE != 0
            {
                return Err(ConfigError::InputSize { width, height });
            }
        }
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        Ok(())
    }

    /// One class name per line, trimmed; blank lines are skipped.
    pub fn load_class_names(&self) -> Result<Vec<String>, ConfigError> {
        let raw = read_text(&self.classes_path)?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Anchor `(width, height)` pairs from the first line of the anchors file,
    /// given as `w0,h0, w1,h1, ...`.
    pub fn load_anchors(&self) -> Result<Vec<(f32, f32)>, ConfigError> {
        let path = &self.anchors_path;
        let raw = read_text(path)?;
        let line = raw.lines().next().unwrap_or_default();
        let values = line
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f32>().map_err(|e| ConfigError::Anchors {
                    path: path.clone(),
                    reason: format!("{v:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() || values.len() % 2 != 0 {
            return Err(ConfigError::Anchors {
                path: path.clone(),
                reason: format!("expected an even, non-zero count of values, got {}", values.len()),
            });
        }
        Ok(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
    }

    /// Network input size for a frame of `width x height`.
    pub fn input_size(&self, width: usize, height: usize) -> (u32, u32) {
        self.model_image_size.unwrap_or_else(|| {
            let w = width as u32;
            let h = height as u32;
            (w - w % INPUT_STRIDE, h - h % INPUT_STRIDE)
        })
    }

    /// Drop low-confidence candidates, then suppress overlapping boxes of the
    /// same class. The result is sorted by decreasing score.
    pub fn filter_candidates(&self, candidates: &[BoundingBox]) -> Vec<BoundingBox> {
        let mut sorted: Vec<BoundingBox> = candidates
            .iter()
            .filter(|b| b.score >= self.score_threshold)
            .copied()
            .collect();
        sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut kept: Vec<BoundingBox> = Vec::with_capacity(sorted.len());
        for candidate in sorted {
            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && iou(k, &candidate) > self.iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
            }
        }
        kept
    }

    /// Highest-confidence surviving candidate of `target_class`.
    pub fn select_target(&self, candidates: &[BoundingBox], target_class: u32) -> Option<BoundingBox> {
        self.filter_candidates(candidates)
            .into_iter()
            .find(|b| b.class_id == target_class)
    }
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Intersection over union of two boxes; zero when either has no area.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let w = (a.right.min(b.right) - a.left.max(b.left)).max(0.0);
    let h = (a.bottom.min(b.bottom) - a.top.max(b.top)).max(0.0);
    let inter = w * h;
    let union = a.width().max(0.0) * a.height().max(0.0) + b.width().max(0.0) * b.height().max(0.0)
        - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Round a box to whole pixels and clamp it to a `width x height` frame.
pub fn clamp_to_frame(bbox: &BoundingBox, width: usize, height: usize) -> BoundingBox {
    let round = |v: f32, max: usize| (v + 0.5).floor().clamp(0.0, max as f32);
    BoundingBox {
        top: round(bbox.top, height),
        left: round(bbox.left, width),
        bottom: round(bbox.bottom, height),
        right: round(bbox.right, width),
        ..*bbox
    }
}

/// A frame resized into a network input with aspect ratio preserved.
#[derive(Clone, Debug)]
pub struct Letterboxed {
    pub frame: Frame,
    /// Source pixels to input pixels.
    pub scale: f32,
    pub pad_left: usize,
    pub pad_top: usize,
}

impl Letterboxed {
    /// Map a box from network input coordinates back to the source frame.
    pub fn to_source(&self, bbox: &BoundingBox) -> BoundingBox {
        let sx = |v: f32| (v - self.pad_left as f32) / self.scale;
        let sy = |v: f32| (v - self.pad_top as f32) / self.scale;
        BoundingBox {
            top: sy(bbox.top),
            left: sx(bbox.left),
            bottom: sy(bbox.bottom),
            right: sx(bbox.right),
            ..*bbox
        }
    }
}

/// Scale `frame` to fit `(width, height)` and center it on a gray canvas.
pub fn letterbox(frame: &Frame, size: (u32, u32)) -> Letterboxed {
    let (tw, th) = (size.0 as usize, size.1 as usize);
    let scale = (tw as f32 / frame.width as f32).min(th as f32 / frame.height as f32);
    let nw = ((frame.width as f32 * scale) as usize).clamp(1, tw.max(1));
    let nh = ((frame.height as f32 * scale) as usize).clamp(1, th.max(1));
    let pad_left = (tw - nw) / 2;
    let pad_top = (th - nh) / 2;

    let c = frame.channels;
    let mut data = vec![LETTERBOX_FILL; tw * th * c];
    let sx = frame.width as f32 / nw as f32;
    let sy = frame.height as f32 / nh as f32;
    let max_x = (frame.width - 1) as f32;
    let max_y = (frame.height - 1) as f32;
    for y in 0..nh {
        let src_y = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        for x in 0..nw {
            let src_x = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let start = ((y + pad_top) * tw + x + pad_left) * c;
            frame.sample_bilinear_into(src_x, src_y, &mut data[start..start + c]);
        }
    }

    Letterboxed {
        frame: Frame {
            width: tw,
            height: th,
            channels: c,
            data,
            index: frame.index,
            captured_at: frame.captured_at,
        },
        scale: nw as f32 / frame.width as f32,
        pad_left,
        pad_top,
    }
}
