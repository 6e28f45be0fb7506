//! Headerless planar video streams, one tightly packed frame after another.

use std::io::{ErrorKind, Read, Write};

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::video::types::{PixelFormat, Rational, VideoFrame};

/// Reads frames of a fixed format and size from a raw byte stream.
///
/// Frames are stamped with their index unless a frame rate and time base are
/// given with [`with_timing`](Self::with_timing), in which case the index is
/// rescaled into the time base.
pub struct RawVideoReader<R> {
    inner: R,
    format: PixelFormat,
    width: usize,
    height: usize,
    buffer: Vec<u8>,
    frames_read: u64,
    finished: bool,
    timing: Option<(Rational, Rational)>,
}

/// Timestamp of frame `index` in `time_base` units for a constant
/// `frame_rate`, rounded to the nearest tick. `None` when either rate is
/// unknown or the result does not fit.
pub fn frame_timestamp(index: u64, frame_rate: Rational, time_base: Rational) -> Option<i64> {
    if frame_rate.num <= 0 || frame_rate.den <= 0 || time_base.num <= 0 || time_base.den <= 0 {
        return None;
    }

    let num = i128::from(index) * i128::from(frame_rate.den) * i128::from(time_base.den);
    let den = i128::from(frame_rate.num) * i128::from(time_base.num);
    i64::try_from((2 * num + den) / (2 * den)).ok()
}

impl<R: Read> RawVideoReader<R> {
    pub fn new(inner: R, format: PixelFormat, width: usize, height: usize) -> Self {
        Self {
            inner,
            format,
            width,
            height,
            buffer: vec![0; format.frame_size(width, height)],
            frames_read: 0,
            finished: false,
            timing: None,
        }
    }

    /// Stamp frames in `time_base` units for a stream running at `frame_rate`.
    /// Frames carry no timestamp when the frame rate is unknown.
    pub fn with_timing(mut self, frame_rate: Rational, time_base: Rational) -> Self {
        self.timing = Some((frame_rate, time_base));
        self
    }

    /// Bytes per frame
    pub fn frame_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, `None` at end of stream.
    ///
    /// End of input inside a frame is reported as [`FrameError::Truncated`].
    pub fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.finished || self.buffer.is_empty() {
            return Ok(None);
        }

        let filled = self.fill_buffer()?;
        if filled == 0 {
            self.finished = true;
            debug!("End of raw stream after {} frames", self.frames_read);
            return Ok(None);
        }
        if filled < self.buffer.len() {
            self.finished = true;
            return Err(FrameError::Truncated {
                expected: self.buffer.len(),
                actual: filled,
            }
            .into());
        }

        let pts = match self.timing {
            Some((frame_rate, time_base)) => frame_timestamp(self.frames_read, frame_rate, time_base),
            None => i64::try_from(self.frames_read).ok(),
        };
        let frame = VideoFrame::from_packed(self.format, self.width, self.height, &self.buffer)?
            .with_pts(pts);
        self.frames_read += 1;
        Ok(Some(frame))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill_buffer(&mut self) -> Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for RawVideoReader<R> {
    type Item = Result<VideoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

/// Writes frames as tightly packed planar bytes.
pub struct RawVideoWriter<W: Write> {
    inner: W,
    frames_written: u64,
}

impl<W: Write> RawVideoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    pub fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        for plane in frame.planes() {
            let view = plane.view();
            for y in 0..view.height() {
                self.inner.write_all(view.row(y))?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HueError;
    use std::io::Cursor;

    fn stream_bytes(format: PixelFormat, width: usize, height: usize, frames: usize) -> Vec<u8> {
        let size = format.frame_size(width, height);
        (0..size * frames).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_reads_whole_frames() {
        let bytes = stream_bytes(PixelFormat::Yuv420p, 4, 2, 3);
        let reader = RawVideoReader::new(Cursor::new(bytes), PixelFormat::Yuv420p, 4, 2);
        assert_eq!(reader.frame_size(), 12);

        let frames: Vec<VideoFrame> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].pts, Some(2));
        assert_eq!(frames[1].plane(0).get(0, 0), 12);
        assert_eq!(frames[1].plane(1).get(1, 0), 21);
        assert_eq!(frames[1].plane(2).get(0, 0), 22);
    }

    #[test]
    fn test_timestamps_follow_time_base() {
        let bytes = stream_bytes(PixelFormat::Yuv420p, 2, 2, 26);
        let reader = RawVideoReader::new(Cursor::new(bytes), PixelFormat::Yuv420p, 2, 2)
            .with_timing(Rational::new(25, 1), Rational::new(1, 90000));

        let frames: Vec<VideoFrame> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(frames[1].pts, Some(3600));
        assert_eq!(frames[25].pts, Some(90000));
    }

    #[test]
    fn test_unknown_rate_leaves_frames_unstamped() {
        let bytes = stream_bytes(PixelFormat::Yuv420p, 2, 2, 2);
        let mut reader = RawVideoReader::new(Cursor::new(bytes), PixelFormat::Yuv420p, 2, 2)
            .with_timing(Rational::new(0, 1), Rational::new(1, 1_000_000));
        assert_eq!(reader.read_frame().unwrap().unwrap().pts, None);
        assert_eq!(reader.read_frame().unwrap().unwrap().pts, None);
    }

    #[test]
    fn test_frame_timestamp_rounds_to_nearest_tick() {
        let ntsc = Rational::new(30000, 1001);
        assert_eq!(frame_timestamp(0, ntsc, Rational::new(1, 1000)), Some(0));
        assert_eq!(frame_timestamp(1, ntsc, Rational::new(1, 1000)), Some(33));
        assert_eq!(frame_timestamp(2, ntsc, Rational::new(1, 1000)), Some(67));
        assert_eq!(frame_timestamp(7, ntsc, ntsc.invert()), Some(7));
        assert_eq!(frame_timestamp(1, Rational::new(25, 1), Rational::new(0, 1)), None);
    }

    #[test]
    fn test_partial_frame_is_truncated() {
        let mut bytes = stream_bytes(PixelFormat::Yuv444p, 2, 2, 1);
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader = RawVideoReader::new(Cursor::new(bytes), PixelFormat::Yuv444p, 2, 2);

        assert!(reader.read_frame().unwrap().is_some());
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            HueError::Frame(FrameError::Truncated {
                expected: 12,
                actual: 3
            })
        ));
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = RawVideoReader::new(Cursor::new(Vec::new()), PixelFormat::Yuv420p, 8, 8);
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 0);
    }

    #[test]
    fn test_writer_restores_bytes() {
        let bytes = stream_bytes(PixelFormat::Yuva420p, 5, 3, 2);
        let reader = RawVideoReader::new(Cursor::new(bytes.clone()), PixelFormat::Yuva420p, 5, 3);

        let mut writer = RawVideoWriter::new(Vec::new());
        for frame in reader {
            writer.write_frame(&frame.unwrap()).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(writer.frames_written(), 2);
        assert_eq!(writer.into_inner(), bytes);
    }
}
