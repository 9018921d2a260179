use auralize_core::Frame;
use std::collections::VecDeque;

/// Result of one read attempt on a video origin.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(Frame),
    /// Transient failure; reading again may succeed.
    Retry,
    /// No more frames will ever come.
    Exhausted,
}

/// A camera device, file or any other producer of frames.
pub trait FrameOrigin {
    /// Read the next frame; may block on the device.
    fn read(&mut self) -> ReadOutcome;

    /// Human-readable description for logs.
    fn describe(&self) -> String {
        "frame origin".to_string()
    }
}

impl<O: FrameOrigin + ?Sized> FrameOrigin for Box<O> {
    fn read(&mut self) -> ReadOutcome {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// In-memory origin; `None` entries behave like failed reads.
#[derive(Debug, Default)]
pub struct MemoryOrigin {
    reads: VecDeque<Option<Frame>>,
}

impl MemoryOrigin {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            reads: frames.into_iter().map(Some).collect(),
        }
    }

    pub fn with_failures(reads: impl IntoIterator<Item = Option<Frame>>) -> Self {
        Self {
            reads: reads.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.reads.len()
    }
}

impl FrameOrigin for MemoryOrigin {
    fn read(&mut self) -> ReadOutcome {
        match self.reads.pop_front() {
            Some(Some(frame)) => ReadOutcome::Frame(frame),
            Some(None) => ReadOutcome::Retry,
            None => ReadOutcome::Exhausted,
        }
    }

    fn describe(&self) -> String {
        format!("memory origin ({} reads left)", self.reads.len())
    }
}
