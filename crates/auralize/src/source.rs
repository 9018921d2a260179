use crate::error::StartupError;
use auralize_stream::{AcquisitionMode, FrameOrigin, ImageSequenceOrigin};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where frames come from, as selected on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    /// Live camera device, `cam` or `cam:<index>`.
    Camera(u32),
    /// Directory or glob of recorded frames.
    Recorded(PathBuf),
}

impl FromStr for DataSource {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StartupError::InvalidSource(s.to_string()));
        }
        if s == "cam" {
            return Ok(Self::Camera(0));
        }
        if let Some(index) = s.strip_prefix("cam:") {
            return index
                .parse()
                .map(Self::Camera)
                .map_err(|_| StartupError::InvalidSource(s.to_string()));
        }
        Ok(Self::Recorded(PathBuf::from(s)))
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(index) => write!(f, "cam:{index}"),
            Self::Recorded(path) => write!(f, "{}", path.display()),
        }
    }
}

impl DataSource {
    /// Live input drops stale frames; recorded input never does.
    pub fn default_mode(&self) -> AcquisitionMode {
        match self {
            Self::Camera(_) => AcquisitionMode::Concurrent,
            Self::Recorded(_) => AcquisitionMode::Sequential,
        }
    }

    pub fn open_origin(&self) -> Result<Box<dyn FrameOrigin + Send>, StartupError> {
        match self {
            Self::Camera(index) => Err(StartupError::NoCaptureBackend { index: *index }),
            Self::Recorded(path) => {
                let pattern = path.to_string_lossy();
                Ok(Box::new(ImageSequenceOrigin::open(&pattern)?))
            }
        }
    }
}
