//! Requantized output placement.

/// Writes finalized pixels into a channel-minor `[OH, OW, C]` plane.
///
/// `channels` is the channel extent of the destination: the full COUT when
/// writing straight into the caller's tensor, `CO_TILE` for a private tile
/// plane that is scattered later.
pub struct OutputWriter<'a> {
    out: &'a mut [i8],
    out_width: usize,
    channels: usize,
    written: u64,
}

impl<'a> OutputWriter<'a> {
    pub fn new(out: &'a mut [i8], out_width: usize, channels: usize) -> Self {
        Self {
            out,
            out_width,
            channels,
            written: 0,
        }
    }

    /// Store `values` for output channels `co0..co0+N` of pixel `(oy, ox)`.
    #[inline(always)]
    pub fn write<const N: usize>(&mut self, oy: usize, ox: usize, co0: usize, values: &[i8; N]) {
        debug_assert!(co0 + N <= self.channels);
        let base = (oy * self.out_width + ox) * self.channels + co0;
        self.out[base..base + N].copy_from_slice(values);
        self.written += N as u64;
    }

    /// Elements stored so far.
    #[inline(always)]
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Copy a private `[OH*OW, tile]` plane into channels `co0..co0+tile` of `out`.
pub fn scatter_tile_plane(plane: &[i8], out: &mut [i8], out_channels: usize, co0: usize, tile: usize) {
    debug_assert_eq!(plane.len() / tile, out.len() / out_channels);
    for (src, dst) in plane.chunks_exact(tile).zip(out.chunks_exact_mut(out_channels)) {
        dst[co0..co0 + tile].copy_from_slice(src);
    }
}
