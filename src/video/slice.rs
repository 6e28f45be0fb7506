use std::ops::Range;

use crate::error::FrameError;
use crate::hue::RotationCoefficients;
use crate::video::rotate::ChromaRotator;
use crate::video::types::{Subsampling, VideoFrame};

/// Index of the alpha plane in formats that carry one
const ALPHA_PLANE: usize = 3;

/// Drives the chroma rotation over row ranges of a frame.
///
/// Luma (and alpha) rows are copied unchanged. Chroma row bounds are always
/// derived from the luma bounds, so any partition of a frame into row ranges
/// produces the same output as a single whole-frame call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceProcessor {
    subsampling: Subsampling,
    parallel: bool,
}

impl SliceProcessor {
    pub fn new(subsampling: Subsampling) -> Self {
        Self {
            subsampling,
            parallel: false,
        }
    }

    /// Spread chroma rows of each range over the rayon pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }

    /// Chroma rows owned by the luma rows `start..end` of a frame `height`
    /// rows tall. The last range of a frame also takes the partial chroma row
    /// left by an odd height.
    pub fn chroma_rows(&self, start: usize, end: usize, height: usize) -> Range<usize> {
        if start >= end {
            let row = self.subsampling.chroma_row(start);
            return row..row;
        }
        let chroma_end = if end >= height {
            self.subsampling.chroma_height(height)
        } else {
            self.subsampling.chroma_row(end)
        };
        self.subsampling.chroma_row(start).min(chroma_end)..chroma_end
    }

    /// Process luma rows `row_start..row_start + row_count`.
    ///
    /// Rows past the frame height are ignored. Nothing is written when the
    /// frames differ in format or size.
    pub fn process_rows(
        &self,
        input: &VideoFrame,
        output: &mut VideoFrame,
        row_start: usize,
        row_count: usize,
        coefficients: RotationCoefficients,
    ) {
        if !input.same_geometry(output) {
            return;
        }

        let end = row_start.saturating_add(row_count).min(input.height());
        let start = row_start.min(end);

        output
            .plane_mut(0)
            .view_mut()
            .rows_mut(start, end)
            .copy_from(&input.plane(0).view().rows(start, end));

        if input.format().has_alpha() {
            output
                .plane_mut(ALPHA_PLANE)
                .view_mut()
                .rows_mut(start, end)
                .copy_from(&input.plane(ALPHA_PLANE).view().rows(start, end));
        }

        let chroma = self.chroma_rows(start, end, input.height());
        let u_in = input.plane(1).view().rows(chroma.start, chroma.end);
        let v_in = input.plane(2).view().rows(chroma.start, chroma.end);

        let (u_plane, v_plane) = output.chroma_mut();
        let mut u_view = u_plane.view_mut();
        let mut v_view = v_plane.view_mut();
        let mut u_out = u_view.rows_mut(chroma.start, chroma.end);
        let mut v_out = v_view.rows_mut(chroma.start, chroma.end);

        let rotator = ChromaRotator::new(coefficients);
        if self.parallel {
            rotator.rotate_parallel(&u_in, &v_in, u_out, v_out);
        } else {
            rotator.rotate(&u_in, &v_in, &mut u_out, &mut v_out);
        }
    }
}

/// Progress of one output frame after its coefficients were resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// More row ranges are expected, starting at or after `next_row`
    RowsAvailable { next_row: usize },
    /// Row ranges covering the full height have been delivered
    Complete,
}

/// Per-frame state: the coefficients fixed for this frame and the rows
/// delivered so far.
///
/// A session owns a copy of its coefficients, so reconfiguring the filter
/// while a frame is open only affects the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSession {
    coefficients: RotationCoefficients,
    height: usize,
    next_row: usize,
    rows_done: usize,
    index: u64,
}

impl FrameSession {
    pub(crate) fn new(coefficients: RotationCoefficients, height: usize, index: u64) -> Self {
        Self {
            coefficients,
            height,
            next_row: 0,
            rows_done: 0,
            index,
        }
    }

    pub fn coefficients(&self) -> RotationCoefficients {
        self.coefficients
    }

    /// Zero-based index of the frame in its stream
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn state(&self) -> FrameState {
        if self.rows_done >= self.height {
            FrameState::Complete
        } else {
            FrameState::RowsAvailable {
                next_row: self.next_row,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == FrameState::Complete
    }

    /// Accept the range `row_start..row_start + row_count` if it lies within
    /// the frame and does not go back over rows already delivered.
    pub(crate) fn advance(&mut self, row_start: usize, row_count: usize) -> Result<Range<usize>, FrameError> {
        let end = row_start.saturating_add(row_count);
        if row_start < self.next_row || end > self.height {
            return Err(FrameError::InvalidRowRange {
                start: row_start,
                end,
                next: self.next_row,
                height: self.height,
            });
        }

        if row_count > 0 {
            self.next_row = end;
            self.rows_done += row_count;
        }
        Ok(row_start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::rotate::rotate_sample;
    use crate::video::types::PixelFormat;

    fn gradient(format: PixelFormat, width: usize, height: usize) -> VideoFrame {
        let mut frame = VideoFrame::new_black(format, width, height);
        for plane_index in 0..format.plane_count() {
            let plane = frame.plane_mut(plane_index);
            for y in 0..plane.height() {
                for x in 0..plane.width() {
                    let value = (x * 37 + y * 71 + plane_index * 13) % 256;
                    plane.set(x, y, value as u8);
                }
            }
        }
        frame
    }

    fn coefficients() -> RotationCoefficients {
        RotationCoefficients::from_hue(1.1, 1.7)
    }

    #[test]
    fn test_chroma_rows_follow_luma_bounds() {
        let processor = SliceProcessor::new(Subsampling::new(1, 1));
        assert_eq!(processor.chroma_rows(0, 4, 8), 0..2);
        assert_eq!(processor.chroma_rows(4, 8, 8), 2..4);
        assert_eq!(processor.chroma_rows(0, 3, 8), 0..1);
        assert_eq!(processor.chroma_rows(3, 5, 8), 1..2);
        assert_eq!(processor.chroma_rows(3, 3, 8), 1..1);
    }

    #[test]
    fn test_last_range_covers_partial_chroma_row() {
        let processor = SliceProcessor::new(Subsampling::new(1, 1));
        assert_eq!(processor.chroma_rows(0, 9, 9), 0..5);
        assert_eq!(processor.chroma_rows(6, 9, 9), 3..5);
        assert_eq!(processor.chroma_rows(6, 8, 9), 3..4);
        assert_eq!(processor.chroma_rows(8, 9, 9), 4..5);
        assert_eq!(processor.chroma_rows(9, 9, 9), 4..4);
    }

    #[test]
    fn test_mid_frame_range_leaves_next_chroma_row() {
        let input = gradient(PixelFormat::Yuv420p, 8, 8);
        let mut output = VideoFrame::new_filled(PixelFormat::Yuv420p, 8, 8, [16, 7, 7]);
        let processor = SliceProcessor::new(Subsampling::new(1, 1));
        let c = coefficients();

        processor.process_rows(&input, &mut output, 0, 3, c);

        let expected = rotate_sample(input.plane(1).get(0, 0), input.plane(2).get(0, 0), c.cos_scaled, c.sin_scaled);
        assert_eq!((output.plane(1).get(0, 0), output.plane(2).get(0, 0)), expected);
        for x in 0..4 {
            assert_eq!(output.plane(1).get(x, 1), 7);
            assert_eq!(output.plane(2).get(x, 1), 7);
        }

        processor.process_rows(&input, &mut output, 3, 5, c);
        let expected = rotate_sample(input.plane(1).get(0, 1), input.plane(2).get(0, 1), c.cos_scaled, c.sin_scaled);
        assert_eq!((output.plane(1).get(0, 1), output.plane(2).get(0, 1)), expected);
    }

    #[test]
    fn test_mismatched_or_oversized_ranges_do_not_panic() {
        let input = gradient(PixelFormat::Yuva420p, 6, 4);
        let processor = SliceProcessor::new(Subsampling::new(1, 1));

        let mut other = VideoFrame::new_black(PixelFormat::Yuv420p, 6, 4);
        processor.process_rows(&input, &mut other, 0, 4, coefficients());
        assert_eq!(other, VideoFrame::new_black(PixelFormat::Yuv420p, 6, 4));

        let mut narrow = VideoFrame::new_black(PixelFormat::Yuva420p, 4, 4);
        processor.process_rows(&input, &mut narrow, 0, 4, coefficients());
        assert_eq!(narrow, VideoFrame::new_black(PixelFormat::Yuva420p, 4, 4));

        let mut output = VideoFrame::new_black(PixelFormat::Yuva420p, 6, 4);
        processor.process_rows(&input, &mut output, 2, usize::MAX, coefficients());
        assert_eq!(output.plane(0).get(0, 3), input.plane(0).get(0, 3));
        assert_eq!(output.plane(0).get(0, 1), 16);
    }

    #[test]
    fn test_whole_frame() {
        let input = gradient(PixelFormat::Yuv420p, 8, 8);
        let mut output = VideoFrame::new_black(PixelFormat::Yuv420p, 8, 8);
        let processor = SliceProcessor::new(PixelFormat::Yuv420p.subsampling());
        let c = coefficients();

        processor.process_rows(&input, &mut output, 0, 8, c);

        assert_eq!(output.plane(0), input.plane(0));
        for y in 0..4 {
            for x in 0..4 {
                let expected = rotate_sample(
                    input.plane(1).get(x, y),
                    input.plane(2).get(x, y),
                    c.cos_scaled,
                    c.sin_scaled,
                );
                assert_eq!((output.plane(1).get(x, y), output.plane(2).get(x, y)), expected);
            }
        }
    }

    #[test]
    fn test_two_ranges_match_single_call() {
        let input = gradient(PixelFormat::Yuv420p, 8, 8);
        let processor = SliceProcessor::new(PixelFormat::Yuv420p.subsampling());
        let c = coefficients();

        let mut whole = VideoFrame::new_black(PixelFormat::Yuv420p, 8, 8);
        processor.process_rows(&input, &mut whole, 0, 8, c);

        let mut split = VideoFrame::new_black(PixelFormat::Yuv420p, 8, 8);
        processor.process_rows(&input, &mut split, 0, 4, c);
        processor.process_rows(&input, &mut split, 4, 4, c);

        assert_eq!(split, whole);
    }

    #[test]
    fn test_any_partition_matches_single_call() {
        for format in PixelFormat::ALL {
            for (width, height) in [(8, 8), (7, 9), (13, 5), (4, 1)] {
                let input = gradient(format, width, height);
                let processor = SliceProcessor::new(format.subsampling());
                let c = coefficients();

                let mut whole = VideoFrame::new_black(format, width, height);
                processor.process_rows(&input, &mut whole, 0, height, c);

                for step in 1..=height {
                    let mut split = VideoFrame::new_black(format, width, height);
                    let mut row = 0;
                    while row < height {
                        let count = step.min(height - row);
                        processor.process_rows(&input, &mut split, row, count, c);
                        row += count;
                    }
                    assert_eq!(split, whole, "{format} {width}x{height} step {step}");
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_serial() {
        let input = gradient(PixelFormat::Yuv422p, 16, 10);
        let c = coefficients();

        let mut serial = VideoFrame::new_black(PixelFormat::Yuv422p, 16, 10);
        SliceProcessor::new(Subsampling::new(1, 0)).process_rows(&input, &mut serial, 0, 10, c);

        let mut parallel = VideoFrame::new_black(PixelFormat::Yuv422p, 16, 10);
        let processor = SliceProcessor::new(Subsampling::new(1, 0)).with_parallel(true);
        processor.process_rows(&input, &mut parallel, 0, 6, c);
        processor.process_rows(&input, &mut parallel, 6, 4, c);

        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_alpha_is_copied() {
        let input = gradient(PixelFormat::Yuva420p, 6, 4);
        let mut output = VideoFrame::new_black(PixelFormat::Yuva420p, 6, 4);
        SliceProcessor::new(Subsampling::new(1, 1)).process_rows(&input, &mut output, 0, 4, coefficients());
        assert_eq!(output.plane(3), input.plane(3));
    }

    #[test]
    fn test_rows_outside_range_are_untouched() {
        let input = gradient(PixelFormat::Yuv420p, 8, 8);
        let mut output = VideoFrame::new_black(PixelFormat::Yuv420p, 8, 8);
        SliceProcessor::new(Subsampling::new(1, 1)).process_rows(&input, &mut output, 2, 2, coefficients());

        assert_eq!(output.plane(0).get(0, 1), 16);
        assert_eq!(output.plane(0).get(0, 2), input.plane(0).get(0, 2));
        assert_eq!(output.plane(0).get(0, 4), 16);
        assert_eq!(output.plane(1).get(0, 0), 128);
        assert_eq!(output.plane(1).get(0, 2), 128);
    }

    #[test]
    fn test_session_progress() {
        let mut session = FrameSession::new(RotationCoefficients::IDENTITY, 8, 0);
        assert_eq!(session.state(), FrameState::RowsAvailable { next_row: 0 });

        assert_eq!(session.advance(0, 4).unwrap(), 0..4);
        assert_eq!(session.state(), FrameState::RowsAvailable { next_row: 4 });

        assert!(matches!(
            session.advance(2, 2),
            Err(FrameError::InvalidRowRange { next: 4, .. })
        ));
        assert!(session.advance(4, 5).is_err());
        assert!(session.advance(4, 0).is_ok());

        session.advance(4, 4).unwrap();
        assert!(session.is_complete());
    }

    #[test]
    fn test_empty_frame_is_complete() {
        let session = FrameSession::new(RotationCoefficients::IDENTITY, 0, 0);
        assert!(session.is_complete());
    }
}
