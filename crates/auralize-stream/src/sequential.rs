use crate::origin::{FrameOrigin, ReadOutcome};
use auralize_core::Frame;
use log::debug;

/// Blocking pull over a finite origin; never drops a frame.
pub struct SequentialSource<O> {
    origin: O,
    delivered: u64,
    exhausted: bool,
}

impl<O: FrameOrigin> SequentialSource<O> {
    pub fn new(origin: O) -> Self {
        Self {
            origin,
            delivered: 0,
            exhausted: false,
        }
    }

    /// Read until a frame arrives or the origin is exhausted. Once `None`
    /// has been returned, every later call returns `None` too.
    pub fn current_frame(&mut self) -> Option<Frame> {
        if self.exhausted {
            return None;
        }
        loop {
            match self.origin.read() {
                ReadOutcome::Frame(frame) => {
                    let frame = frame.with_index(self.delivered);
                    self.delivered += 1;
                    return Some(frame);
                }
                ReadOutcome::Retry => continue,
                ReadOutcome::Exhausted => {
                    debug!(
                        "{} exhausted after {} frames",
                        self.origin.describe(),
                        self.delivered
                    );
                    self.exhausted = true;
                    return None;
                }
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::MemoryOrigin;

    fn frame(value: u8) -> Frame {
        Frame::filled(4, 3, 1, value).expect("frame")
    }

    #[test]
    fn delivers_every_frame_in_order_then_exhausts() {
        let n = 6;
        let mut source = SequentialSource::new(MemoryOrigin::new((0..n).map(frame)));
        for k in 0..n {
            let f = source.current_frame().expect("frame");
            assert_eq!(k, f.data[0]);
            assert_eq!(k as u64, f.index);
        }
        assert!(source.current_frame().is_none());
        assert!(source.is_exhausted());
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn failed_reads_are_retried() {
        let reads = vec![None, Some(frame(1)), None, None, Some(frame(2))];
        let mut source = SequentialSource::new(MemoryOrigin::with_failures(reads));
        assert_eq!(1, source.current_frame().expect("frame").data[0]);
        assert_eq!(2, source.current_frame().expect("frame").data[0]);
        assert!(source.current_frame().is_none());
        assert_eq!(2, source.delivered());
    }
}
