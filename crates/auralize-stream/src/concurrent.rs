//! Background acquisition with a bounded most-recent-wins hand-off buffer.
//!
//! The producer thread is the only sender. When the buffer is full it pulls
//! the oldest frame out through its own receiver clone before inserting, so
//! it never blocks on the consumer. The consumer only ever uses `try_recv`.

use crate::error::SourceError;
use crate::origin::{FrameOrigin, ReadOutcome};
use crate::params::SourceParams;
use auralize_core::Frame;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Result of a non-blocking poll.
#[derive(Debug)]
pub enum FramePoll {
    Ready(Frame),
    /// Nothing new yet.
    Empty,
    /// The origin ended and every frame has been handed over.
    Exhausted,
}

impl FramePoll {
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Ready(frame) => Some(frame),
            Self::Empty | Self::Exhausted => None,
        }
    }
}

struct Producer<O> {
    origin: O,
    tx: Sender<Frame>,
    evict: Receiver<Frame>,
    alive: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    done: Sender<()>,
}

impl<O: FrameOrigin> Producer<O> {
    fn run(mut self) {
        let mut index = 0u64;
        let mut evicted = 0u64;
        while self.alive.load(Ordering::Acquire) {
            match self.origin.read() {
                ReadOutcome::Frame(frame) => {
                    if !self.publish(frame.with_index(index), &mut evicted) {
                        break;
                    }
                    index += 1;
                }
                ReadOutcome::Retry => thread::yield_now(),
                ReadOutcome::Exhausted => {
                    debug!("{} exhausted", self.origin.describe());
                    break;
                }
            }
        }
        debug!("acquisition stopped: {index} frames read, {evicted} evicted");
        self.finished.store(true, Ordering::Release);
        let _ = self.done.send(());
    }

    /// Insert, evicting the oldest buffered frame when full. Returns `false`
    /// once the consumer side is gone.
    fn publish(&self, frame: Frame, evicted: &mut u64) -> bool {
        let mut pending = frame;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        *evicted += 1;
                    }
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Frame source whose origin is read on a dedicated thread.
pub struct ConcurrentSource {
    rx: Receiver<Frame>,
    alive: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
    /// Result of the join; `false` once the thread panicked or was detached.
    stopped_cleanly: bool,
}

impl ConcurrentSource {
    pub fn spawn<O>(origin: O, params: &SourceParams) -> Result<Self, SourceError>
    where
        O: FrameOrigin + Send + 'static,
    {
        let (tx, rx) = bounded::<Frame>(params.buffer_capacity.max(1));
        let (done_tx, done_rx) = bounded::<()>(1);
        let alive = Arc::new(AtomicBool::new(true));
        let finished = Arc::new(AtomicBool::new(false));

        let producer = Producer {
            origin,
            tx,
            evict: rx.clone(),
            alive: alive.clone(),
            finished: finished.clone(),
            done: done_tx,
        };
        let handle = thread::Builder::new()
            .name("frame-acquisition".to_string())
            .spawn(move || producer.run())
            .map_err(SourceError::Spawn)?;

        Ok(Self {
            rx,
            alive,
            finished,
            done: done_rx,
            handle: Some(handle),
            join_timeout: params.join_timeout(),
            stopped_cleanly: true,
        })
    }

    /// Drain the buffer down to its newest frame. Never blocks.
    pub fn poll(&self) -> FramePoll {
        // Read the flag first: once set, every frame is already in the buffer.
        let finished = self.finished.load(Ordering::Acquire);
        let mut latest = None;
        while let Ok(frame) = self.rx.try_recv() {
            latest = Some(frame);
        }
        match latest {
            Some(frame) => FramePoll::Ready(frame),
            None if finished => FramePoll::Exhausted,
            None => FramePoll::Empty,
        }
    }

    /// Newest frame, or `None` when nothing has arrived since the last call.
    pub fn current_frame(&self) -> Option<Frame> {
        self.poll().into_frame()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.finished.load(Ordering::Acquire)
    }

    /// Clear the liveness flag and join the thread within the timeout.
    ///
    /// Returns `false` (after logging) when the thread did not stop in time;
    /// it is then left detached. Later calls repeat the first result.
    pub fn shutdown(&mut self) -> bool {
        self.alive.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return self.stopped_cleanly;
        };
        self.stopped_cleanly = match self.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let joined = handle.join().is_ok();
                if !joined {
                    warn!("frame acquisition thread panicked");
                }
                joined
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "frame acquisition thread did not stop within {:?}; detaching it",
                    self.join_timeout
                );
                false
            }
        };
        self.stopped_cleanly
    }
}

impl Drop for ConcurrentSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
