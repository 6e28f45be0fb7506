use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FrameError};

/// A rational number, used for time bases and frame rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value as a double. A zero denominator yields an infinity or NaN.
    pub fn to_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Swap numerator and denominator
    pub fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = ConfigError;

    /// Accepts `num/den` or a plain integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            key: "rational".to_string(),
            value: s.to_string(),
        };

        match s.split_once('/') {
            Some((num, den)) => Ok(Self::new(
                num.trim().parse().map_err(|_| invalid())?,
                den.trim().parse().map_err(|_| invalid())?,
            )),
            None => Ok(Self::new(s.trim().parse().map_err(|_| invalid())?, 1)),
        }
    }
}

/// log2 of the horizontal and vertical chroma decimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Subsampling {
    pub h_shift: u32,
    pub v_shift: u32,
}

impl Subsampling {
    pub const fn new(h_shift: u32, v_shift: u32) -> Self {
        Self { h_shift, v_shift }
    }

    /// Chroma width for a luma width, rounding partial samples up
    pub fn chroma_width(self, width: usize) -> usize {
        ceil_rshift(width, self.h_shift)
    }

    /// Chroma height for a luma height, rounding partial rows up
    pub fn chroma_height(self, height: usize) -> usize {
        ceil_rshift(height, self.v_shift)
    }

    /// Chroma row for a luma row bound
    pub fn chroma_row(self, row: usize) -> usize {
        row >> self.v_shift
    }
}

/// `ceil(value / 2^shift)`
pub fn ceil_rshift(value: usize, shift: u32) -> usize {
    (value + (1 << shift) - 1) >> shift
}

/// Planar 8-bit luma/chroma layouts the filter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv444p,
    Yuv422p,
    Yuv420p,
    Yuv411p,
    Yuv410p,
    Yuv440p,
    Yuva420p,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 7] = [
        Self::Yuv444p,
        Self::Yuv422p,
        Self::Yuv420p,
        Self::Yuv411p,
        Self::Yuv410p,
        Self::Yuv440p,
        Self::Yuva420p,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Yuv444p => "yuv444p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv420p => "yuv420p",
            Self::Yuv411p => "yuv411p",
            Self::Yuv410p => "yuv410p",
            Self::Yuv440p => "yuv440p",
            Self::Yuva420p => "yuva420p",
        }
    }

    pub fn subsampling(self) -> Subsampling {
        match self {
            Self::Yuv444p => Subsampling::new(0, 0),
            Self::Yuv422p => Subsampling::new(1, 0),
            Self::Yuv420p | Self::Yuva420p => Subsampling::new(1, 1),
            Self::Yuv411p => Subsampling::new(2, 0),
            Self::Yuv410p => Subsampling::new(2, 2),
            Self::Yuv440p => Subsampling::new(0, 1),
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Yuva420p)
    }

    /// Y, U, V and optionally A
    pub fn plane_count(self) -> usize {
        if self.has_alpha() {
            4
        } else {
            3
        }
    }

    /// Dimensions of plane `index` for a frame of the given luma size
    pub fn plane_size(self, index: usize, width: usize, height: usize) -> (usize, usize) {
        match index {
            1 | 2 => {
                let sub = self.subsampling();
                (sub.chroma_width(width), sub.chroma_height(height))
            }
            _ => (width, height),
        }
    }

    /// Bytes of one tightly packed frame
    pub fn frame_size(self, width: usize, height: usize) -> usize {
        (0..self.plane_count())
            .map(|i| {
                let (w, h) = self.plane_size(i, width, height);
                w * h
            })
            .sum()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| FrameError::UnsupportedFormat {
                format: s.to_string(),
            })
    }
}

/// Stream properties fixed when the filter input is configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub time_base: Rational,
    pub frame_rate: Rational,
}

/// Read-only strided view over 8-bit samples
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    data: &'a [u8],
    stride: usize,
    width: usize,
    height: usize,
}

/// Writable strided view over 8-bit samples
#[derive(Debug)]
pub struct PlaneViewMut<'a> {
    data: &'a mut [u8],
    stride: usize,
    width: usize,
    height: usize,
}

fn check_plane(len: usize, stride: usize, width: usize, height: usize) -> Result<(), FrameError> {
    if stride < width {
        return Err(FrameError::GeometryMismatch {
            expected: format!("stride >= {}", width),
            actual: format!("stride {}", stride),
        });
    }

    let needed = if height == 0 {
        0
    } else {
        stride * (height - 1) + width
    };
    if len < needed {
        return Err(FrameError::PlaneTooSmall {
            needed,
            available: len,
        });
    }
    Ok(())
}

impl<'a> PlaneView<'a> {
    pub fn new(data: &'a [u8], stride: usize, width: usize, height: usize) -> Result<Self, FrameError> {
        check_plane(data.len(), stride, width, height)?;
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Samples of row `y`, exactly `width` long
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// View of rows `start..end`
    pub fn rows(&self, start: usize, end: usize) -> PlaneView<'a> {
        let end = end.min(self.height);
        let start = start.min(end);
        let offset = (start * self.stride).min(self.data.len());
        PlaneView {
            data: &self.data[offset..],
            stride: self.stride,
            width: self.width,
            height: end - start,
        }
    }
}

impl<'a> PlaneViewMut<'a> {
    pub fn new(data: &'a mut [u8], stride: usize, width: usize, height: usize) -> Result<Self, FrameError> {
        check_plane(data.len(), stride, width, height)?;
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Mutable view of rows `start..end`
    pub fn rows_mut(&mut self, start: usize, end: usize) -> PlaneViewMut<'_> {
        let end = end.min(self.height);
        let start = start.min(end);
        let offset = (start * self.stride).min(self.data.len());
        PlaneViewMut {
            data: &mut self.data[offset..],
            stride: self.stride,
            width: self.width,
            height: end - start,
        }
    }

    /// Split into per-row slices for parallel iteration
    pub fn into_rows(self) -> impl Iterator<Item = &'a mut [u8]> {
        let width = self.width;
        self.data
            .chunks_mut(self.stride.max(1))
            .take(self.height)
            .map(move |row| &mut row[..width])
    }

    /// Copy `src` row by row; widths and heights must match
    pub fn copy_from(&mut self, src: &PlaneView<'_>) {
        for y in 0..self.height.min(src.height()) {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
    }
}

/// One owned image plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
    width: usize,
    height: usize,
}

impl Plane {
    /// Plane filled with `value`, with rows padded to `stride`
    pub fn filled(width: usize, height: usize, stride: usize, value: u8) -> Self {
        let stride = stride.max(width);
        Self {
            data: vec![value; stride * height],
            stride,
            width,
            height,
        }
    }

    /// Wrap existing samples
    pub fn from_vec(data: Vec<u8>, stride: usize, width: usize, height: usize) -> Result<Self, FrameError> {
        check_plane(data.len(), stride, width, height)?;
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    pub fn view(&self) -> PlaneView<'_> {
        PlaneView {
            data: &self.data,
            stride: self.stride,
            width: self.width,
            height: self.height,
        }
    }

    pub fn view_mut(&mut self) -> PlaneViewMut<'_> {
        PlaneViewMut {
            data: &mut self.data,
            stride: self.stride,
            width: self.width,
            height: self.height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.stride + x] = value;
    }
}

/// A planar Y'CbCr video frame
///
/// Planes are ordered Y, U, V and, for formats with alpha, A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    format: PixelFormat,
    width: usize,
    height: usize,
    planes: Vec<Plane>,
    /// Presentation timestamp in stream time base units
    pub pts: Option<i64>,
}

impl VideoFrame {
    /// Create a black frame (Y=16, U=V=128, opaque alpha)
    pub fn new_black(format: PixelFormat, width: usize, height: usize) -> Self {
        Self::new_filled(format, width, height, [16, 128, 128])
    }

    /// Create a frame with every sample of each plane set to `yuv`
    pub fn new_filled(format: PixelFormat, width: usize, height: usize, yuv: [u8; 3]) -> Self {
        let planes = (0..format.plane_count())
            .map(|i| {
                let (w, h) = format.plane_size(i, width, height);
                let value = yuv.get(i).copied().unwrap_or(255);
                Plane::filled(w, h, w, value)
            })
            .collect();

        Self {
            format,
            width,
            height,
            planes,
            pts: None,
        }
    }

    /// Build a frame from explicit planes
    pub fn from_planes(
        format: PixelFormat,
        width: usize,
        height: usize,
        planes: Vec<Plane>,
    ) -> Result<Self, FrameError> {
        if planes.len() != format.plane_count() {
            return Err(FrameError::GeometryMismatch {
                expected: format!("{} planes", format.plane_count()),
                actual: format!("{} planes", planes.len()),
            });
        }

        for (i, plane) in planes.iter().enumerate() {
            let (w, h) = format.plane_size(i, width, height);
            if plane.width() != w || plane.height() != h {
                return Err(FrameError::GeometryMismatch {
                    expected: format!("plane {} of {}x{}", i, w, h),
                    actual: format!("{}x{}", plane.width(), plane.height()),
                });
            }
        }

        Ok(Self {
            format,
            width,
            height,
            planes,
            pts: None,
        })
    }

    /// Create a frame from tightly packed planar bytes
    pub fn from_packed(
        format: PixelFormat,
        width: usize,
        height: usize,
        bytes: &[u8],
    ) -> Result<Self, FrameError> {
        let expected = format.frame_size(width, height);
        if bytes.len() != expected {
            return Err(FrameError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = 0;
        let mut planes = Vec::with_capacity(format.plane_count());
        for i in 0..format.plane_count() {
            let (w, h) = format.plane_size(i, width, height);
            planes.push(Plane::from_vec(bytes[offset..offset + w * h].to_vec(), w, w, h)?);
            offset += w * h;
        }

        Self::from_planes(format, width, height, planes)
    }

    /// Tightly packed planar bytes, the inverse of [`VideoFrame::from_packed`]
    pub fn to_packed(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.format.frame_size(self.width, self.height));
        for plane in &self.planes {
            let view = plane.view();
            for y in 0..view.height() {
                bytes.extend_from_slice(view.row(y));
            }
        }
        bytes
    }

    pub fn with_pts(mut self, pts: Option<i64>) -> Self {
        self.pts = pts;
        self
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// Mutable access to the U and V planes at once
    pub fn chroma_mut(&mut self) -> (&mut Plane, &mut Plane) {
        let (_, rest) = self.planes.split_at_mut(1);
        let (u, rest) = rest.split_at_mut(1);
        (&mut u[0], &mut rest[0])
    }

    /// Whether `other` has the same format and dimensions
    pub fn same_geometry(&self, other: &VideoFrame) -> bool {
        self.format == other.format && self.width == other.width && self.height == other.height
    }

    pub fn describe(&self) -> String {
        format!("{} {}x{}", self.format, self.width, self.height)
    }
}
