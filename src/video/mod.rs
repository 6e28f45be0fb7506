//! # Video Processing Module
//!
//! Planar Y'CbCr frames, the fixed-point chroma rotation and the row-range
//! driver that applies it.

pub mod processor;
pub mod raw;
pub mod rotate;
pub mod slice;
pub mod types;

pub use processor::{HueFilter, REINIT_COMMAND};
pub use raw::{frame_timestamp, RawVideoReader, RawVideoWriter};
pub use rotate::{rotate_sample, ChromaRotator};
pub use slice::{FrameSession, FrameState, SliceProcessor};
pub use types::{
    Plane, PlaneView, PlaneViewMut, PixelFormat, Rational, StreamInfo, Subsampling, VideoFrame,
};
