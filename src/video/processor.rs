use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{CommandError, FrameError, HueError, Result};
use crate::hue::{ParameterResolver, VariableContext};
use crate::video::slice::{FrameSession, SliceProcessor};
use crate::video::types::{StreamInfo, VideoFrame};

/// Name of the runtime command that re-parses the filter options
pub const REINIT_COMMAND: &str = "reinit";

/// Hue/saturation filter over a stream of planar Y'CbCr frames.
///
/// Frames go through [`start_frame`](Self::start_frame), which resolves the
/// coefficients for that frame, then through one or more
/// [`draw_rows`](Self::draw_rows) calls covering increasing row ranges.
/// [`filter_frame`](Self::filter_frame) does both for a whole frame.
#[derive(Debug, Clone)]
pub struct HueFilter {
    resolver: ParameterResolver,
    vars: VariableContext,
    stream: Option<StreamInfo>,
    slices: Option<SliceProcessor>,
    slice_height: Option<usize>,
    parallel_rows: bool,
}

impl HueFilter {
    /// Create a filter from option text, `""` for hue 0 and saturation 1
    pub fn new(options: &str) -> Result<Self> {
        Ok(Self {
            resolver: ParameterResolver::from_options(options)?,
            vars: VariableContext::default(),
            stream: None,
            slices: None,
            slice_height: None,
            parallel_rows: false,
        })
    }

    /// Rows per range in [`filter_frame`](Self::filter_frame), whole frame when `None`
    pub fn with_slice_height(mut self, rows: Option<usize>) -> Self {
        self.slice_height = rows.filter(|&rows| rows > 0);
        self
    }

    /// Spread the chroma rows of each range over the rayon pool
    pub fn with_parallel_rows(mut self, parallel: bool) -> Self {
        self.parallel_rows = parallel;
        self.slices = self.slices.map(|slices| slices.with_parallel(parallel));
        self
    }

    /// Accept the stream properties. Resets the frame counter.
    pub fn configure_input(&mut self, info: StreamInfo) -> Result<()> {
        let subsampling = info.format.subsampling();
        info!(
            "Configured input: {} {}x{} tb:{} r:{} (chroma shift {}x{})",
            info.format,
            info.width,
            info.height,
            info.time_base,
            info.frame_rate,
            subsampling.h_shift,
            subsampling.v_shift
        );

        self.vars = VariableContext::new(info.time_base, info.frame_rate);
        self.slices = Some(SliceProcessor::new(subsampling).with_parallel(self.parallel_rows));
        self.stream = Some(info);
        Ok(())
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn resolver(&self) -> &ParameterResolver {
        &self.resolver
    }

    pub fn variables(&self) -> &VariableContext {
        &self.vars
    }

    /// Open a frame: record its timestamp and resolve its coefficients.
    pub fn start_frame(&mut self, input: &VideoFrame) -> Result<FrameSession> {
        let stream = self.check_input(input)?;

        self.vars.set_timestamp(input.pts);
        let index = self.vars.frame_count();
        let coefficients = self.resolver.resolve_for_frame(&mut self.vars);

        debug!(
            "Frame {} pts:{:?} c:{} s:{}",
            index, input.pts, coefficients.cos_scaled, coefficients.sin_scaled
        );
        Ok(FrameSession::new(coefficients, stream.height, index))
    }

    /// Transform rows `row_start..row_start + row_count` of an open frame.
    ///
    /// Ranges must lie within the frame and come in increasing order.
    pub fn draw_rows(
        &self,
        session: &mut FrameSession,
        input: &VideoFrame,
        output: &mut VideoFrame,
        row_start: usize,
        row_count: usize,
    ) -> Result<()> {
        let slices = self.slices.ok_or(FrameError::NotConfigured)?;
        self.check_input(input)?;
        if !output.same_geometry(input) {
            return Err(FrameError::GeometryMismatch {
                expected: input.describe(),
                actual: output.describe(),
            }
            .into());
        }

        let rows = session.advance(row_start, row_count)?;
        slices.process_rows(input, output, rows.start, rows.len(), session.coefficients());
        Ok(())
    }

    /// Filter one whole frame
    pub fn filter_frame(&mut self, input: &VideoFrame) -> Result<VideoFrame> {
        let mut session = self.start_frame(input)?;
        self.render(&mut session, input)
    }

    /// Filter a batch of consecutive frames.
    ///
    /// Every frame is checked before any coefficients are resolved, so a
    /// rejected batch leaves the frame counter untouched. Coefficients are
    /// resolved in frame order; frames are then transformed in parallel.
    pub fn filter_frames(&mut self, inputs: &[VideoFrame]) -> Result<Vec<VideoFrame>> {
        for input in inputs {
            self.check_input(input)?;
        }

        let sessions = inputs
            .iter()
            .map(|input| self.start_frame(input))
            .collect::<Result<Vec<_>>>()?;

        let this = &*self;
        inputs
            .par_iter()
            .zip(sessions.into_par_iter())
            .map(|(input, mut session)| this.render(&mut session, input))
            .collect()
    }

    /// Handle a runtime command.
    ///
    /// `reinit` re-parses `args` as filter options. A failed reinit keeps the
    /// previous parameters.
    pub fn process_command(&mut self, name: &str, args: &str) -> Result<()> {
        if name != REINIT_COMMAND {
            return Err(CommandError::NotSupported {
                name: name.to_string(),
            }
            .into());
        }

        self.resolver.configure(args).map_err(|err| {
            warn!("Ignoring {} '{}': {}", name, args, err);
            HueError::from(err)
        })
    }

    fn render(&self, session: &mut FrameSession, input: &VideoFrame) -> Result<VideoFrame> {
        let mut output =
            VideoFrame::new_black(input.format(), input.width(), input.height()).with_pts(input.pts);
        let height = input.height();
        let step = self.slice_height.unwrap_or(height).max(1);

        let mut row = 0;
        while row < height {
            let count = step.min(height - row);
            self.draw_rows(session, input, &mut output, row, count)?;
            row += count;
        }
        Ok(output)
    }

    fn check_input(&self, input: &VideoFrame) -> Result<StreamInfo> {
        let stream = self.stream.ok_or(FrameError::NotConfigured)?;
        if input.format() != stream.format
            || input.width() != stream.width
            || input.height() != stream.height
        {
            return Err(FrameError::GeometryMismatch {
                expected: format!("{} {}x{}", stream.format, stream.width, stream.height),
                actual: input.describe(),
            }
            .into());
        }
        Ok(stream)
    }
}
