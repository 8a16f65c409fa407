//! On-chip weight storage for one `(output tile, input tile)` pair.

/// Origin of the slice currently held by a [`WeightTile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOrigin {
    pub co0: usize,
    pub ci0: usize,
}

/// `CO x CI x K x K` int8 kernels, indexed `taps[co][ci][ky][kx]`.
///
/// Refreshed on every input-tile step: the slice depends on both `co0` and
/// `ci0`, so nothing is reused across output tiles.
#[derive(Debug, Clone)]
pub struct WeightTile<const CO: usize, const CI: usize, const K: usize> {
    taps: [[[[i8; K]; K]; CI]; CO],
    origin: Option<TileOrigin>,
}

impl<const CO: usize, const CI: usize, const K: usize> WeightTile<CO, CI, K> {
    pub const fn new() -> Self {
        Self {
            taps: [[[[0; K]; K]; CI]; CO],
            origin: None,
        }
    }

    /// Copy the slice at `(co0, ci0)` out of the flattened weight tensor.
    ///
    /// `in_channels` is the full CIN of `weights`. Offsets must be tile
    /// aligned and in range; anything else is a caller bug.
    pub fn load(&mut self, weights: &[i8], in_channels: usize, co0: usize, ci0: usize) {
        debug_assert_eq!(co0 % CO, 0, "co0 must be tile aligned");
        debug_assert_eq!(ci0 % CI, 0, "ci0 must be tile aligned");
        debug_assert!(ci0 + CI <= in_channels, "ci0 out of range");

        let kk = K * K;
        for (co, per_co) in self.taps.iter_mut().enumerate() {
            for (ci, per_ci) in per_co.iter_mut().enumerate() {
                // The K*K taps of one (co, ci) pair are contiguous.
                let base = ((co0 + co) * in_channels + ci0 + ci) * kk;
                let src = &weights[base..base + kk];
                for (ky, row) in per_ci.iter_mut().enumerate() {
                    row.copy_from_slice(&src[ky * K..ky * K + K]);
                }
            }
        }
        self.origin = Some(TileOrigin { co0, ci0 });
    }

    /// Tile pair currently held, `None` before the first load.
    #[inline(always)]
    pub fn origin(&self) -> Option<TileOrigin> {
        self.origin
    }

    #[inline(always)]
    pub fn is_loaded_for(&self, co0: usize, ci0: usize) -> bool {
        self.origin == Some(TileOrigin { co0, ci0 })
    }

    /// Kernels of output lane `co`: `[ci][ky][kx]`.
    #[inline(always)]
    pub fn lane(&self, co: usize) -> &[[[i8; K]; K]; CI] {
        &self.taps[co]
    }

    #[inline(always)]
    pub fn get(&self, co: usize, ci: usize, ky: usize, kx: usize) -> i8 {
        self.taps[co][ci][ky][kx]
    }
}

impl<const CO: usize, const CI: usize, const K: usize> Default for WeightTile<CO, CI, K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(cout: usize, cin: usize, k: usize) -> Vec<i8> {
        (0..cout * cin * k * k).map(|i| (i % 251) as i8).collect()
    }

    #[test]
    fn test_load_matches_flat_index() {
        let (cout, cin, k) = (8, 6, 3);
        let weights = ramp(cout, cin, k);
        let mut tile = WeightTile::<4, 3, 3>::new();
        tile.load(&weights, cin, 4, 3);

        for co in 0..4 {
            for ci in 0..3 {
                for ky in 0..3 {
                    for kx in 0..3 {
                        let idx = (((4 + co) * cin + 3 + ci) * k + ky) * k + kx;
                        assert_eq!(tile.get(co, ci, ky, kx), weights[idx]);
                    }
                }
            }
        }
        assert!(tile.is_loaded_for(4, 3));
        assert!(!tile.is_loaded_for(0, 3));
    }

    #[test]
    fn test_reload_replaces_previous_tile() {
        let weights = ramp(4, 4, 3);
        let mut tile = WeightTile::<2, 2, 3>::new();
        assert_eq!(tile.origin(), None);

        tile.load(&weights, 4, 0, 0);
        let first = tile.get(1, 1, 2, 2);
        tile.load(&weights, 4, 2, 2);
        assert_eq!(tile.origin(), Some(TileOrigin { co0: 2, ci0: 2 }));
        assert_ne!(tile.get(1, 1, 2, 2), first);
        assert_eq!(tile.lane(0)[0][0][0], weights[(2 * 4 + 2) * 9]);
    }
}
