//! Multiply-accumulate lanes and the per-pixel accumulator banks.
//!
//! The bank of one output pixel lives across every input-channel tile of
//! one output tile: seeded from the bias on the first tile, accumulated on
//! each tile, requantized on the last. Because the schedule visits all
//! pixels for one input tile before moving to the next, each pixel keeps its
//! bank in a [`PartialSums`] slot until it is finalized.

use super::weight_tile::WeightTile;
use super::window::Window;
use crate::quant::requantize;

/// Sum of `window[ky][kx][ci] * kernels[ci][ky][kx]` onto `acc`.
///
/// Products of two int8 values always fit in i32; the running sum wraps like
/// a 32-bit hardware adder, so any summation order gives the same result.
#[inline(always)]
pub fn mac_lane<const K: usize, const C: usize>(
    window: &Window<K, C>,
    kernels: &[[[i8; K]; K]; C],
    mut acc: i32,
) -> i32 {
    for (ky, row) in window.taps().iter().enumerate() {
        for (kx, tap) in row.iter().enumerate() {
            for (ci, &sample) in tap.iter().enumerate() {
                acc = acc.wrapping_add(sample as i32 * kernels[ci][ky][kx] as i32);
            }
        }
    }
    acc
}

/// Running int32 sums for the `CO` lanes of one output pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorBank<const CO: usize> {
    sums: [i32; CO],
    tiles: usize,
}

impl<const CO: usize> AccumulatorBank<CO> {
    pub const fn new() -> Self {
        Self {
            sums: [0; CO],
            tiles: 0,
        }
    }

    /// Start a new pixel: every lane takes its output channel's bias.
    #[inline(always)]
    pub fn seed(&mut self, bias: &[i32]) {
        self.sums.copy_from_slice(&bias[..CO]);
        self.tiles = 0;
    }

    /// Add one input-channel tile's contribution to every lane.
    #[inline(always)]
    pub fn accumulate<const CI: usize, const K: usize>(
        &mut self,
        window: &Window<K, CI>,
        weights: &WeightTile<CO, CI, K>,
    ) {
        for (co, sum) in self.sums.iter_mut().enumerate() {
            *sum = mac_lane(window, weights.lane(co), *sum);
        }
        self.tiles += 1;
    }

    /// Input-channel tiles folded in since the last seed.
    #[inline(always)]
    pub fn tiles_accumulated(&self) -> usize {
        self.tiles
    }

    #[inline(always)]
    pub fn sums(&self) -> &[i32; CO] {
        &self.sums
    }

    /// Shift-and-saturate every lane.
    #[inline(always)]
    pub fn requantize(&self) -> [i8; CO] {
        let mut out = [0i8; CO];
        for (o, &s) in out.iter_mut().zip(self.sums.iter()) {
            *o = requantize(s);
        }
        out
    }
}

impl<const CO: usize> Default for AccumulatorBank<CO> {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`AccumulatorBank`] per output pixel, allocated once and never resized.
#[derive(Debug, Clone)]
pub struct PartialSums<const CO: usize> {
    banks: Box<[AccumulatorBank<CO>]>,
    out_width: usize,
}

impl<const CO: usize> PartialSums<CO> {
    pub fn new(out_height: usize, out_width: usize) -> Self {
        Self {
            banks: vec![AccumulatorBank::new(); out_height * out_width].into_boxed_slice(),
            out_width,
        }
    }

    #[inline(always)]
    pub fn bank_mut(&mut self, oy: usize, ox: usize) -> &mut AccumulatorBank<CO> {
        &mut self.banks[oy * self.out_width + ox]
    }

    #[inline(always)]
    pub fn bank(&self, oy: usize, ox: usize) -> &AccumulatorBank<CO> {
        &self.banks[oy * self.out_width + ox]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}
