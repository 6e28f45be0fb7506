use crate::video::types::Rational;

/// Names visible to hue and saturation expressions, in slot order.
pub const VAR_NAMES: [&str; 5] = ["n", "pts", "r", "t", "tb"];

/// Slot of each expression variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    /// Zero-based count of frames resolved so far
    N = 0,
    /// Raw presentation timestamp, NaN if unknown
    Pts = 1,
    /// Frame rate in frames per second, NaN if unknown
    R = 2,
    /// Timestamp in seconds, NaN if unknown
    T = 3,
    /// Time base as a double
    Tb = 4,
}

/// Per-stream variable vector handed to expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableContext {
    values: [f64; 5],
    time_base: Rational,
}

impl VariableContext {
    /// Build the context for a newly configured stream.
    ///
    /// `n` starts at zero and the timestamp slots are unknown until the first
    /// frame arrives.
    pub fn new(time_base: Rational, frame_rate: Rational) -> Self {
        let mut values = [f64::NAN; 5];
        values[Var::N as usize] = 0.0;
        values[Var::Tb as usize] = time_base.to_f64();
        values[Var::R as usize] = if frame_rate.num == 0 || frame_rate.den == 0 {
            f64::NAN
        } else {
            frame_rate.to_f64()
        };

        Self { values, time_base }
    }

    /// Record the timestamp of the frame about to be resolved.
    pub fn set_timestamp(&mut self, pts: Option<i64>) {
        match pts {
            Some(pts) => {
                self.values[Var::Pts as usize] = pts as f64;
                self.values[Var::T as usize] = pts as f64 * self.time_base.to_f64();
            }
            None => {
                self.values[Var::Pts as usize] = f64::NAN;
                self.values[Var::T as usize] = f64::NAN;
            }
        }
    }

    /// Count one more resolved frame.
    pub fn advance(&mut self) {
        self.values[Var::N as usize] += 1.0;
    }

    pub fn get(&self, var: Var) -> f64 {
        self.values[var as usize]
    }

    /// Values in [`VAR_NAMES`] order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Frames resolved so far
    pub fn frame_count(&self) -> u64 {
        self.values[Var::N as usize] as u64
    }
}

impl Default for VariableContext {
    /// Context for a stream with a microsecond time base and unknown rate
    fn default() -> Self {
        Self::new(Rational::new(1, 1_000_000), Rational::new(0, 1))
    }
}
