//! Frame sources for the auralize pipeline.
//!
//! A [`FrameOrigin`] is anything that can be read for frames: a camera, a
//! recorded image sequence, an in-memory list. Sources wrap an origin in one
//! of two acquisition modes:
//!
//! - [`SequentialSource`]: the caller drives reads and receives every frame
//!   in order until the origin is exhausted.
//! - [`ConcurrentSource`]: a background thread reads continuously into a
//!   bounded buffer (capacity 2 by default). When the buffer is full the
//!   oldest frame is dropped, so the consumer always sees the newest frame
//!   and polling never blocks.
//!
//! ```
//! use auralize_core::Frame;
//! use auralize_stream::{MemoryOrigin, SequentialSource};
//!
//! let frames = (0..3).map(|v| Frame::filled(4, 4, 1, v).unwrap());
//! let mut source = SequentialSource::new(MemoryOrigin::new(frames));
//! let mut n = 0;
//! while let Some(_frame) = source.current_frame() {
//!     n += 1;
//! }
//! assert_eq!(n, 3);
//! ```

mod concurrent;
mod error;
mod origin;
mod params;
mod recorded;
mod sequential;
mod source;

pub use concurrent::{ConcurrentSource, FramePoll};
pub use error::SourceError;
pub use origin::{FrameOrigin, MemoryOrigin, ReadOutcome};
pub use params::SourceParams;
pub use recorded::{frame_from_image, list_images, ImageSequenceOrigin};
pub use sequential::SequentialSource;
pub use source::{AcquisitionMode, FrameSource};
