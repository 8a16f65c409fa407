//! Explicit tile schedule and pipeline stages.
//!
//! The tile loops are `co0` outer, `ci0` inner. Each [`TilePass`] carries
//! whether it seeds the accumulators (first input tile of its output tile)
//! and whether it finalizes them (last input tile), so the accumulator
//! lifetime comes from the schedule rather than from loop position.

use super::weight_tile::TileOrigin;

/// One `(co0, ci0)` tile pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePass {
    pub co0: usize,
    pub ci0: usize,
    /// `ci0 == 0`: accumulators start from the bias.
    pub seed: bool,
    /// `ci0 == CIN - CI_TILE`: accumulators are requantized and written.
    pub finalize: bool,
}

impl TilePass {
    #[inline(always)]
    pub fn origin(&self) -> TileOrigin {
        TileOrigin {
            co0: self.co0,
            ci0: self.ci0,
        }
    }
}

/// Iterator over tile pairs for a range of output tiles.
#[derive(Debug, Clone)]
pub struct TileSchedule {
    in_channels: usize,
    ci_tile: usize,
    co_tile: usize,
    co_end: usize,
    co0: usize,
    ci0: usize,
}

impl TileSchedule {
    /// Every tile pair of a `COUT x CIN` layer.
    pub fn new(out_channels: usize, co_tile: usize, in_channels: usize, ci_tile: usize) -> Self {
        debug_assert!(co_tile > 0 && out_channels % co_tile == 0);
        debug_assert!(ci_tile > 0 && in_channels % ci_tile == 0);
        Self {
            in_channels,
            ci_tile,
            co_tile,
            co_end: out_channels,
            co0: 0,
            ci0: 0,
        }
    }

    /// The input-tile passes of the single output tile starting at `co0`.
    pub fn output_tile(co0: usize, co_tile: usize, in_channels: usize, ci_tile: usize) -> Self {
        debug_assert!(ci_tile > 0 && in_channels % ci_tile == 0);
        Self {
            in_channels,
            ci_tile,
            co_tile,
            co_end: co0 + co_tile,
            co0,
            ci0: 0,
        }
    }
}

impl Iterator for TileSchedule {
    type Item = TilePass;

    fn next(&mut self) -> Option<TilePass> {
        if self.co0 >= self.co_end {
            return None;
        }
        let pass = TilePass {
            co0: self.co0,
            ci0: self.ci0,
            seed: self.ci0 == 0,
            finalize: self.ci0 + self.ci_tile == self.in_channels,
        };
        self.ci0 += self.ci_tile;
        if self.ci0 == self.in_channels {
            self.ci0 = 0;
            self.co0 += self.co_tile;
        }
        Some(pass)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let ci_tiles = self.in_channels / self.ci_tile;
        let remaining_co = self.co_end.saturating_sub(self.co0) / self.co_tile;
        let n = (remaining_co * ci_tiles).saturating_sub(self.ci0 / self.ci_tile);
        (n, Some(n))
    }
}

impl ExactSizeIterator for TileSchedule {}

/// Pipeline stages of one invocation.
///
/// `Idle -> LoadBias -> { LoadWeights(t) -> ScanRows(t) }+ -> Done`;
/// `Done -> LoadBias` starts the next invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    LoadBias,
    LoadWeights(TileOrigin),
    ScanRows(TileOrigin),
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadBias => "load_bias",
            Self::LoadWeights(_) => "load_weights",
            Self::ScanRows(_) => "scan_rows",
            Self::Done => "done",
        }
    }

    /// Whether `next` may directly follow `self`.
    pub fn can_advance_to(&self, next: &Stage) -> bool {
        match (self, next) {
            (Self::Idle | Self::Done, Self::LoadBias) => true,
            (Self::LoadBias | Self::ScanRows(_), Self::LoadWeights(_)) => true,
            (Self::LoadWeights(loaded), Self::ScanRows(scanned)) => loaded == scanned,
            (Self::ScanRows(_), Self::Done) => true,
            _ => false,
        }
    }
}

/// Current stage plus a legality check on every transition.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Stage,
    transitions: u64,
}

impl StageTracker {
    pub const fn new() -> Self {
        Self {
            current: Stage::Idle,
            transitions: 0,
        }
    }

    #[inline]
    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.current.can_advance_to(&next),
            "illegal stage transition {:?} -> {:?}",
            self.current,
            next
        );
        log::trace!("stage {} -> {}", self.current.name(), next.name());
        self.current = next;
        self.transitions += 1;
    }

    #[inline(always)]
    pub fn current(&self) -> Stage {
        self.current
    }

    #[inline(always)]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_order_and_flags() {
        let passes: Vec<TilePass> = TileSchedule::new(4, 2, 6, 2).collect();
        let pairs: Vec<(usize, usize)> = passes.iter().map(|p| (p.co0, p.ci0)).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 2), (0, 4), (2, 0), (2, 2), (2, 4)]);

        let seeds: Vec<bool> = passes.iter().map(|p| p.seed).collect();
        let finals: Vec<bool> = passes.iter().map(|p| p.finalize).collect();
        assert_eq!(seeds, vec![true, false, false, true, false, false]);
        assert_eq!(finals, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_single_input_tile_seeds_and_finalizes() {
        let passes: Vec<TilePass> = TileSchedule::new(2, 1, 8, 8).collect();
        assert_eq!(passes.len(), 2);
        assert!(passes.iter().all(|p| p.seed && p.finalize));
    }

    #[test]
    fn test_yolo_schedule_len() {
        let schedule = TileSchedule::new(128, 4, 128, 8);
        assert_eq!(schedule.len(), 32 * 16);
        let mut schedule = schedule;
        schedule.next();
        assert_eq!(schedule.len(), 32 * 16 - 1);
        let seeds = TileSchedule::new(128, 4, 128, 8).filter(|p| p.seed).count();
        let finals = TileSchedule::new(128, 4, 128, 8).filter(|p| p.finalize).count();
        assert_eq!((seeds, finals), (32, 32));
    }

    #[test]
    fn test_output_tile_schedule() {
        let passes: Vec<TilePass> = TileSchedule::output_tile(8, 4, 16, 8).collect();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0], TilePass { co0: 8, ci0: 0, seed: true, finalize: false });
        assert_eq!(passes[1], TilePass { co0: 8, ci0: 8, seed: false, finalize: true });
    }

    #[test]
    fn test_stage_transitions() {
        let t = TileOrigin { co0: 0, ci0: 0 };
        let u = TileOrigin { co0: 0, ci0: 8 };
        assert!(Stage::Idle.can_advance_to(&Stage::LoadBias));
        assert!(Stage::LoadBias.can_advance_to(&Stage::LoadWeights(t)));
        assert!(Stage::LoadWeights(t).can_advance_to(&Stage::ScanRows(t)));
        assert!(!Stage::LoadWeights(t).can_advance_to(&Stage::ScanRows(u)));
        assert!(Stage::ScanRows(t).can_advance_to(&Stage::LoadWeights(u)));
        assert!(Stage::ScanRows(u).can_advance_to(&Stage::Done));
        assert!(Stage::Done.can_advance_to(&Stage::LoadBias));

        assert!(!Stage::Idle.can_advance_to(&Stage::ScanRows(t)));
        assert!(!Stage::LoadBias.can_advance_to(&Stage::Done));
        assert!(!Stage::LoadBias.can_advance_to(&Stage::ScanRows(t)));
    }

    #[test]
    fn test_tracker_counts_transitions() {
        let t = TileOrigin { co0: 0, ci0: 0 };
        let mut tracker = StageTracker::new();
        tracker.advance(Stage::LoadBias);
        tracker.advance(Stage::LoadWeights(t));
        tracker.advance(Stage::ScanRows(t));
        tracker.advance(Stage::Done);
        assert_eq!(tracker.current(), Stage::Done);
        assert_eq!(tracker.transitions(), 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal stage transition")]
    fn test_tracker_rejects_skipped_weight_load() {
        let t = TileOrigin { co0: 0, ci0: 0 };
        let mut tracker = StageTracker::new();
        tracker.advance(Stage::LoadBias);
        tracker.advance(Stage::ScanRows(t));
    }
}
