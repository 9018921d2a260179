/// Per-frame fusion failures. None of these are fatal to a running pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("no bounding box to fuse")]
    MissingBox,

    #[error("depth region is empty (box [{left}, {right}) x [{top}, {bottom}) in a {width}x{height} frame)")]
    EmptyRegion {
        left: usize,
        right: usize,
        top: usize,
        bottom: usize,
        width: usize,
        height: usize,
    },

    #[error("depth map is empty or holds no finite values in the region")]
    EmptyDepth,

    #[error("depth map holds {len} values, expected {width}x{height}")]
    InvalidDepth {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("frame has zero size ({width}x{height})")]
    InvalidFrame { width: usize, height: usize },
}
