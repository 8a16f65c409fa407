//! `K x K x C` neighbourhood of one output pixel for the current channel tile.

use super::line_buffer::{LineBuffer, ScanCursor};

/// `taps[ky][kx][ci]` is the input sample at `(y - (K-1-ky), x - (K-1-kx))`,
/// so tap `(ky, kx)` multiplies kernel tap `(ky, kx)`.
#[derive(Debug, Clone)]
pub struct Window<const K: usize, const C: usize> {
    taps: [[[i8; C]; K]; K],
}

impl<const K: usize, const C: usize> Window<K, C> {
    pub const fn new() -> Self {
        Self {
            taps: [[[0; C]; K]; K],
        }
    }

    /// Window with explicit contents, indexed `[ky][kx][ci]`.
    pub const fn from_taps(taps: [[[i8; C]; K]; K]) -> Self {
        Self { taps }
    }

    /// Fill the window whose bottom-right corner is column `x` of the newest row.
    ///
    /// Only defined once the ring is full and `x >= K-1`; earlier positions
    /// have no output (valid convolution, no padding).
    pub fn assemble<const W: usize>(
        &mut self,
        lines: &LineBuffer<K, W, C>,
        cursor: &ScanCursor<K>,
        x: usize,
    ) {
        debug_assert!(cursor.window_ready(), "window read before K rows were pushed");
        debug_assert!(x + 1 >= K && x < W, "column {x} has no full window");

        // Leftmost column of the window; never negative given x >= K-1.
        let x0 = x + 1 - K;
        for (ky, taps_row) in self.taps.iter_mut().enumerate() {
            let row = lines.row(cursor.slot_for_window_row(ky));
            for (kx, tap) in taps_row.iter_mut().enumerate() {
                *tap = row[x0 + kx];
            }
        }
    }

    #[inline(always)]
    pub fn taps(&self) -> &[[[i8; C]; K]; K] {
        &self.taps
    }

    #[inline(always)]
    pub fn get(&self, ky: usize, kx: usize, ci: usize) -> i8 {
        self.taps[ky][kx][ci]
    }
}

impl<const K: usize, const C: usize> Default for Window<K, C> {
    fn default() -> Self {
        Self::new()
    }
}
