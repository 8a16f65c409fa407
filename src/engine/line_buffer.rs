//! Ring of the last `K` input rows for one input-channel tile.
//!
//! Row slots are addressed through a [`ScanCursor`], the explicit scan state
//! carried through the row loop. After `push_row` for row `y`:
//!
//! - `cursor.row_ptr()` is the slot the next push will overwrite, which once
//!   the ring is full is the oldest row `y - (K-1)`;
//! - row `y - d` lives in slot `(row_ptr + K - 1 - d) mod K` for `d in 0..K`.
//!
//! No full-image history is ever kept.

/// Scan state for one input-channel tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor<const K: usize> {
    row_ptr: usize,
    rows_pushed: usize,
}

impl<const K: usize> ScanCursor<K> {
    /// Fresh cursor at the top of the image.
    pub const fn start() -> Self {
        Self {
            row_ptr: 0,
            rows_pushed: 0,
        }
    }

    /// Slot the next row is written to.
    #[inline(always)]
    pub fn row_ptr(&self) -> usize {
        self.row_ptr
    }

    /// Rows pushed since [`ScanCursor::start`].
    #[inline(always)]
    pub fn rows_pushed(&self) -> usize {
        self.rows_pushed
    }

    /// Most recently pushed image row, if any.
    #[inline(always)]
    pub fn newest_row(&self) -> Option<usize> {
        self.rows_pushed.checked_sub(1)
    }

    /// True once `K` rows are resident and a window can be read.
    #[inline(always)]
    pub fn window_ready(&self) -> bool {
        self.rows_pushed >= K
    }

    /// Slot holding window row `ky`, i.e. image row `y - (K-1-ky)`.
    ///
    /// `row_ptr + ky` is at most `2K - 2`, so one conditional subtract wraps it.
    #[inline(always)]
    pub fn slot_for_window_row(&self, ky: usize) -> usize {
        debug_assert!(ky < K);
        let mut r = self.row_ptr + ky;
        if r >= K {
            r -= K;
        }
        r
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.row_ptr += 1;
        if self.row_ptr == K {
            self.row_ptr = 0;
        }
        self.rows_pushed += 1;
    }
}

impl<const K: usize> Default for ScanCursor<K> {
    fn default() -> Self {
        Self::start()
    }
}

/// `K` row slots of `W` pixels by `C` channels.
#[derive(Debug, Clone)]
pub struct LineBuffer<const K: usize, const W: usize, const C: usize> {
    rows: [[[i8; C]; W]; K],
}

impl<const K: usize, const W: usize, const C: usize> LineBuffer<K, W, C> {
    pub const fn new() -> Self {
        Self {
            rows: [[[0; C]; W]; K],
        }
    }

    /// Load image row `y`, channels `ci0..ci0+C`, into slot `cursor.row_ptr()`
    /// and advance the cursor.
    ///
    /// Rows must arrive exactly once each, in increasing order, starting
    /// from a fresh cursor for every input-channel tile.
    pub fn push_row(
        &mut self,
        cursor: &mut ScanCursor<K>,
        input: &[i8],
        in_channels: usize,
        y: usize,
        ci0: usize,
    ) {
        debug_assert_eq!(cursor.rows_pushed, y, "rows must be pushed in order");
        debug_assert!(ci0 + C <= in_channels, "ci0 out of range");

        let slot = &mut self.rows[cursor.row_ptr];
        let row_base = y * W * in_channels;
        for (x, pixel) in slot.iter_mut().enumerate() {
            let idx = row_base + x * in_channels + ci0;
            pixel.copy_from_slice(&input[idx..idx + C]);
        }
        cursor.advance();
    }

    /// Channel vector at `(slot, x)`.
    #[inline(always)]
    pub fn pixel(&self, slot: usize, x: usize) -> &[i8; C] {
        &self.rows[slot][x]
    }

    /// Slot `slot` as a whole row.
    #[inline(always)]
    pub fn row(&self, slot: usize) -> &[[i8; C]; W] {
        &self.rows[slot]
    }
}

impl<const K: usize, const W: usize, const C: usize> Default for LineBuffer<K, W, C> {
    fn default() -> Self {
        Self::new()
    }
}
