use crate::GrayImage;
use std::time::Instant;

/// Errors produced when building a [`Frame`] from a raw buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    InvalidChannels(usize),
}

/// A single interleaved 8-bit image with its capture instant.
///
/// Channel order for 3-channel frames is RGB. A frame is never mutated after
/// undistortion; overlays are drawn on copies.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
    /// Monotonic position of the frame in its origin, assigned by the source.
    pub index: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::InvalidChannels(channels));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(FrameError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            index: 0,
            captured_at: Instant::now(),
        })
    }

    /// Frame filled with a constant value in every channel.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Result<Self, FrameError> {
        Self::new(width, height, channels, vec![value; width * height * channels])
    }

    pub fn from_gray(img: GrayImage) -> Result<Self, FrameError> {
        Self::new(img.width, img.height, 1, img.data)
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    /// Same geometry and metadata, new pixel buffer.
    ///
    /// `data` must have the same length as the original buffer.
    pub fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
            index: self.index,
            captured_at: self.captured_at,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Bilinear sample of every channel at `(x, y)`; samples outside the frame
    /// read as zero (black border).
    pub fn sample_bilinear_into(&self, x: f32, y: f32, out: &mut [u8]) {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        for (c, slot) in out.iter_mut().enumerate().take(self.channels) {
            let p00 = self.channel_at(x0, y0, c);
            let p10 = self.channel_at(x0 + 1, y0, c);
            let p01 = self.channel_at(x0, y0 + 1, c);
            let p11 = self.channel_at(x0 + 1, y0 + 1, c);
            let a = p00 + fx * (p10 - p00);
            let b = p01 + fx * (p11 - p01);
            *slot = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
        }
    }

    #[inline]
    fn channel_at(&self, x: i64, y: i64, c: usize) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.data[(y as usize * self.width + x as usize) * self.channels + c] as f32
    }

    /// Luma conversion (ITU-R BT.601 weights) for detectors working on gray.
    pub fn to_gray(&self) -> GrayImage {
        let data = match self.channels {
            1 => self.data.clone(),
            _ => self
                .data
                .chunks_exact(self.channels)
                .map(|px| {
                    let l = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                    l.round().clamp(0.0, 255.0) as u8
                })
                .collect(),
        };
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}
