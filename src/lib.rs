//! # yuv-hue
//!
//! Hue and saturation adjustment for planar Y'CbCr video by rotating the
//! chroma vector in 16.16 fixed point.
//!
//! ## Quick Start
//!
//! ```rust
//! use yuv_hue::video::{HueFilter, PixelFormat, Rational, StreamInfo, VideoFrame};
//!
//! # fn main() -> yuv_hue::Result<()> {
//! let mut filter = HueFilter::new("h=90*t:s=1.5")?;
//! filter.configure_input(StreamInfo {
//!     width: 64,
//!     height: 48,
//!     format: PixelFormat::Yuv420p,
//!     time_base: Rational::new(1, 25),
//!     frame_rate: Rational::new(25, 1),
//! })?;
//!
//! let input = VideoFrame::new_black(PixelFormat::Yuv420p, 64, 48).with_pts(Some(0));
//! let output = filter.filter_frame(&input)?;
//! assert_eq!(output.plane(0), input.plane(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`expr`] - Arithmetic expressions evaluated per frame
//! - [`hue`] - Option parsing and per-frame parameter resolution
//! - [`video`] - Frames, chroma rotation and the filter driver
//! - [`config`] - Configuration management

pub mod config;
pub mod error;
pub mod expr;
pub mod hue;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{HueError, Result},
    hue::{ParameterResolver, RotationCoefficients},
    video::{HueFilter, VideoFrame},
};
