//! Fixed-point rotation of the (U,V) chroma vector.
//!
//! Considering U and V as the components of a 2D vector, its angle is the hue
//! and its norm the saturation. Rotating and scaling that vector changes both
//! without touching luma.

use rayon::prelude::*;

use crate::hue::RotationCoefficients;
use crate::video::types::{PlaneView, PlaneViewMut};

/// Rounding bias plus the 128 chroma offset, both in 16.16 fixed point
const BIAS: i32 = (1 << 15) + (128 << 16);

/// Rotate one (U,V) sample pair.
///
/// Samples are centered on 128. The products fit in 32 bits for any
/// coefficient derived from a saturation in `[-10, 10]`.
#[inline]
pub fn rotate_sample(u: u8, v: u8, cos: i32, sin: i32) -> (u8, u8) {
    let u = i32::from(u) - 128;
    let v = i32::from(v) - 128;

    let new_u = (cos * u - sin * v + BIAS) >> 16;
    let new_v = (sin * u + cos * v + BIAS) >> 16;

    (clip_u8(new_u), clip_u8(new_v))
}

#[inline]
fn clip_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Applies one set of coefficients to chroma planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaRotator {
    coefficients: RotationCoefficients,
}

impl ChromaRotator {
    pub fn new(coefficients: RotationCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> RotationCoefficients {
        self.coefficients
    }

    /// Rotate one row. All four slices are processed up to the shortest length.
    pub fn rotate_row(&self, u_in: &[u8], v_in: &[u8], u_out: &mut [u8], v_out: &mut [u8]) {
        let RotationCoefficients {
            cos_scaled: c,
            sin_scaled: s,
        } = self.coefficients;

        for (((u_dst, v_dst), &u), &v) in u_out
            .iter_mut()
            .zip(v_out.iter_mut())
            .zip(u_in)
            .zip(v_in)
        {
            let (new_u, new_v) = rotate_sample(u, v, c, s);
            *u_dst = new_u;
            *v_dst = new_v;
        }
    }

    /// Rotate a row in place. Each output sample depends only on the
    /// co-located input pair, so one pass is enough.
    pub fn rotate_row_in_place(&self, u: &mut [u8], v: &mut [u8]) {
        let RotationCoefficients {
            cos_scaled: c,
            sin_scaled: s,
        } = self.coefficients;

        for (u, v) in u.iter_mut().zip(v.iter_mut()) {
            (*u, *v) = rotate_sample(*u, *v, c, s);
        }
    }

    /// Rotate `width x height` samples, where the size is the smaller of the
    /// input and output views.
    pub fn rotate(
        &self,
        u_in: &PlaneView<'_>,
        v_in: &PlaneView<'_>,
        u_out: &mut PlaneViewMut<'_>,
        v_out: &mut PlaneViewMut<'_>,
    ) {
        let height = u_in
            .height()
            .min(v_in.height())
            .min(u_out.height())
            .min(v_out.height());

        for y in 0..height {
            self.rotate_row(u_in.row(y), v_in.row(y), u_out.row_mut(y), v_out.row_mut(y));
        }
    }

    /// Same as [`rotate`](Self::rotate), rows spread over the rayon pool.
    pub fn rotate_parallel(
        &self,
        u_in: &PlaneView<'_>,
        v_in: &PlaneView<'_>,
        u_out: PlaneViewMut<'_>,
        v_out: PlaneViewMut<'_>,
    ) {
        let height = u_in.height().min(v_in.height());
        let u_rows: Vec<&mut [u8]> = u_out.into_rows().take(height).collect();
        let v_rows: Vec<&mut [u8]> = v_out.into_rows().take(height).collect();

        u_rows
            .into_par_iter()
            .zip(v_rows)
            .enumerate()
            .for_each(|(y, (u_row, v_row))| {
                self.rotate_row(u_in.row(y), v_in.row(y), u_row, v_row);
            });
    }
}
