//! Collaborators that replay recorded results, so the pipeline runs
//! end-to-end without model runtimes or audio hardware.

use crate::collab::{AudioSink, DepthEstimator, Display, ObjectDetector};
use auralize_calib::debug::frame_to_image;
use auralize_core::{BoundingBox, DepthMap, Frame, Position3D};
use auralize_stream::{list_images, SourceError};
use log::{info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid detections in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Detections recorded per frame: a JSON array holding one array of boxes
/// for each frame index.
#[derive(Clone, Debug, Default)]
pub struct ReplayDetector {
    per_frame: Vec<Vec<BoundingBox>>,
}

impl ReplayDetector {
    pub fn new(per_frame: Vec<Vec<BoundingBox>>) -> Self {
        Self { per_frame }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let per_frame = serde_json::from_str(&raw).map_err(|source| ReplayError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { per_frame })
    }

    pub fn len(&self) -> usize {
        self.per_frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_frame.is_empty()
    }
}

impl ObjectDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self.per_frame
            .get(frame.index as usize)
            .cloned()
            .unwrap_or_default()
    }
}

/// Same depth everywhere, every frame.
#[derive(Clone, Copy, Debug)]
pub struct ConstantDepth {
    pub value: f32,
}

impl DepthEstimator for ConstantDepth {
    fn estimate(&mut self, frame: &Frame) -> Option<DepthMap> {
        Some(DepthMap::constant(frame.width, frame.height, self.value))
    }
}

/// Depth maps stored as images, one per frame index. Intensities are mapped
/// to `[0, 1]` and multiplied by `scale`.
#[derive(Clone, Debug)]
pub struct RecordedDepth {
    paths: Vec<PathBuf>,
    scale: f32,
}

impl RecordedDepth {
    pub fn open(pattern: &str, scale: f32) -> Result<Self, SourceError> {
        let paths = list_images(pattern)?;
        info!("{} recorded depth maps from {pattern:?}", paths.len());
        Ok(Self { paths, scale })
    }
}

impl DepthEstimator for RecordedDepth {
    fn estimate(&mut self, frame: &Frame) -> Option<DepthMap> {
        let path = self.paths.get(frame.index as usize)?;
        let img = match image::open(path) {
            Ok(img) => img.to_luma32f(),
            Err(err) => {
                warn!("{}: {err}", path.display());
                return None;
            }
        };
        let (w, h) = (img.width() as usize, img.height() as usize);
        let data = img.into_raw().into_iter().map(|v| v * self.scale).collect();
        DepthMap::new(w, h, data)
    }
}

#[derive(Serialize)]
struct PositionRecord {
    x: f64,
    y: f64,
    z: f64,
}

/// Audio sink that logs positions and optionally appends them to a
/// JSON-lines file.
#[derive(Debug, Default)]
pub struct LoggingAudioSink {
    writer: Option<BufWriter<File>>,
    position: Option<Position3D>,
    plays: u64,
}

impl LoggingAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            ..Self::default()
        })
    }

    pub fn last_position(&self) -> Option<Position3D> {
        self.position
    }

    pub fn plays(&self) -> u64 {
        self.plays
    }
}

impl AudioSink for LoggingAudioSink {
    fn set_position(&mut self, position: Position3D) {
        self.position = Some(position);
    }

    fn play(&mut self) {
        self.plays += 1;
        let Some(p) = self.position else {
            return;
        };
        info!("sound at ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
        if let Some(writer) = self.writer.as_mut() {
            let record = PositionRecord {
                x: p.x,
                y: p.y,
                z: p.z,
            };
            let written = serde_json::to_writer(&mut *writer, &record)
                .map_err(std::io::Error::from)
                .and_then(|()| writer.write_all(b"\n"))
                .and_then(|()| writer.flush());
            if let Err(err) = written {
                warn!("dropping position log after write failure: {err}");
                self.writer = None;
            }
        }
    }
}

/// Display without a window. The quit key is `q` followed by Enter on
/// stdin; shown frames can be saved as numbered PNGs.
pub struct HeadlessDisplay {
    quit: Arc<AtomicBool>,
    save_dir: Option<PathBuf>,
    shown: u64,
}

impl HeadlessDisplay {
    /// Display whose quit flag is set by a background stdin reader.
    pub fn with_stdin_quit() -> Self {
        let quit = Arc::new(AtomicBool::new(false));
        let flag = quit.clone();
        let spawned = std::thread::Builder::new()
            .name("quit-key".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                            flag.store(true, Ordering::Release);
                            break;
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            });
        if let Err(err) = spawned {
            warn!("quit key unavailable: {err}");
        }
        Self::with_flag(quit)
    }

    pub fn with_flag(quit: Arc<AtomicBool>) -> Self {
        Self {
            quit,
            save_dir: None,
            shown: 0,
        }
    }

    pub fn save_frames_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) {
        self.shown += 1;
        let Some(dir) = &self.save_dir else {
            return;
        };
        let path = dir.join(format!("frame_{:06}.png", frame.index));
        let saved = fs::create_dir_all(dir)
            .map_err(|e| e.to_string())
            .and_then(|()| frame_to_image(frame).ok_or_else(|| "unsupported frame".to_string()))
            .and_then(|img| img.save(&path).map_err(|e| e.to_string()));
        if let Err(err) = saved {
            warn!("{}: {err}", path.display());
        }
    }

    fn quit_requested(&mut self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_detector_indexes_by_frame() {
        let boxes = vec![vec![], vec![BoundingBox::new(1.0, 2.0, 3.0, 4.0)]];
        let mut detector = ReplayDetector::new(boxes);
        let f = Frame::filled(4, 4, 1, 0).expect("frame");
        assert!(detector.detect(&f.clone().with_index(0)).is_empty());
        assert_eq!(1, detector.detect(&f.clone().with_index(1)).len());
        assert!(detector.detect(&f.with_index(9)).is_empty());
    }

    #[test]
    fn detections_load_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("det.json");
        fs::write(
            &path,
            r#"[[{"top":1,"left":2,"bottom":3,"right":4,"score":0.9,"class_id":5}],[]]"#,
        )
        .expect("write");
        let detector = ReplayDetector::load(&path).expect("load");
        assert_eq!(2, detector.len());

        fs::write(&path, "{").expect("write");
        assert!(matches!(
            ReplayDetector::load(&path),
            Err(ReplayError::Json { .. })
        ));
    }

    #[test]
    fn recorded_depth_scales_intensities() {
        let dir = tempfile::tempdir().expect("tempdir");
        image::GrayImage::from_pixel(4, 3, image::Luma([255]))
            .save(dir.path().join("d0.png"))
            .expect("save");
        let mut depth =
            RecordedDepth::open(dir.path().to_str().expect("utf8"), 0.05).expect("open");
        let f = Frame::filled(8, 6, 3, 0).expect("frame");
        let map = depth.estimate(&f).expect("depth");
        assert_eq!((4, 3), (map.width, map.height));
        assert!(map.data.iter().all(|&v| (v - 0.05).abs() < 1e-6));
        assert!(depth.estimate(&f.with_index(1)).is_none());
    }

    #[test]
    fn audio_sink_writes_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.jsonl");
        let mut sink = LoggingAudioSink::with_output(&path).expect("sink");
        sink.set_position(Position3D::new(0.1, -0.2, 0.05));
        sink.play();
        sink.play();
        assert_eq!(2, sink.plays());
        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(2, raw.lines().count());
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().expect("line"))
            .expect("json");
        assert_eq!(0.05, first["z"]);
    }

    #[test]
    fn headless_display_saves_and_reports_quit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let quit = Arc::new(AtomicBool::new(false));
        let mut display = HeadlessDisplay::with_flag(quit.clone()).save_frames_to(dir.path());
        display.show(&Frame::filled(4, 4, 3, 9).expect("frame").with_index(7));
        assert!(dir.path().join("frame_000007.png").exists());
        assert!(!display.quit_requested());
        quit.store(true, Ordering::Release);
        assert!(display.quit_requested());
    }
}
