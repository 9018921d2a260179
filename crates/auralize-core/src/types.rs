use serde::{Deserialize, Serialize};

/// Axis-aligned detection in the pixel coordinates of the frame that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    /// Detector confidence in `[0, 1]`.
    pub score: f32,
    pub class_id: u32,
}

impl BoundingBox {
    pub fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
            score: 1.0,
            class_id: 0,
        }
    }

    pub fn with_class(mut self, class_id: u32, score: f32) -> Self {
        self.class_id = class_id;
        self.score = score;
        self
    }

    /// Box center `(cx, cy)`.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.right + self.left) * 0.5,
            (self.bottom + self.top) * 0.5,
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Dense row-major grid of depth values.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthMap {
    /// Returns `None` when `data` does not hold `width * height` values.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn constant(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Object position relative to the camera: `x`, `y` normalized by the frame
/// size around its center, `z` in the depth estimator's scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}
