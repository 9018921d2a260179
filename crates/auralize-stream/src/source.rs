use crate::concurrent::{ConcurrentSource, FramePoll};
use crate::error::SourceError;
use crate::origin::FrameOrigin;
use crate::params::SourceParams;
use crate::sequential::SequentialSource;
use auralize_core::Frame;
use log::info;

/// How frames are acquired from an origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Caller-driven reads; every frame is delivered.
    Sequential,
    /// Background thread; only the newest frames survive.
    Concurrent,
}

/// Frame source in either acquisition mode.
pub enum FrameSource {
    Sequential(SequentialSource<Box<dyn FrameOrigin + Send>>),
    Concurrent(ConcurrentSource),
}

impl FrameSource {
    pub fn open(
        origin: Box<dyn FrameOrigin + Send>,
        mode: AcquisitionMode,
        params: &SourceParams,
    ) -> Result<Self, SourceError> {
        info!("opening {} in {mode:?} mode", origin.describe());
        Ok(match mode {
            AcquisitionMode::Sequential => Self::Sequential(SequentialSource::new(origin)),
            AcquisitionMode::Concurrent => Self::Concurrent(ConcurrentSource::spawn(origin, params)?),
        })
    }

    pub fn mode(&self) -> AcquisitionMode {
        match self {
            Self::Sequential(_) => AcquisitionMode::Sequential,
            Self::Concurrent(_) => AcquisitionMode::Concurrent,
        }
    }

    /// Sequential sources block for the next frame; concurrent ones return
    /// immediately with whatever is newest.
    pub fn poll(&mut self) -> FramePoll {
        match self {
            Self::Sequential(s) => match s.current_frame() {
                Some(frame) => FramePoll::Ready(frame),
                None => FramePoll::Exhausted,
            },
            Self::Concurrent(c) => c.poll(),
        }
    }

    pub fn current_frame(&mut self) -> Option<Frame> {
        self.poll().into_frame()
    }

    /// Stop acquisition. A no-op for sequential sources.
    pub fn shutdown(&mut self) -> bool {
        match self {
            Self::Sequential(_) => true,
            Self::Concurrent(c) => c.shutdown(),
        }
    }
}
