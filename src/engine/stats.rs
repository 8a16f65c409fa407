//! Per-invocation traffic and work counters.

use std::ops::AddAssign;

use crate::types::ConvShape;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Bias vectors copied on chip.
    pub bias_loads: u64,
    /// `CO_TILE x CI_TILE x K x K` weight slices copied on chip.
    pub weight_tile_loads: u64,
    /// Input rows pushed into the line buffer.
    pub rows_pushed: u64,
    /// Windows assembled (one per output pixel per tile pair).
    pub windows_built: u64,
    /// Individual multiply-accumulates.
    pub mac_ops: u64,
    /// Accumulator banks initialised from the bias.
    pub accumulator_seeds: u64,
    /// int8 output elements written.
    pub outputs_written: u64,
}

impl EngineStats {
    /// Counters a complete run over `shape` must produce.
    pub fn expected_for(shape: &ConvShape) -> Self {
        let tile_pairs = (shape.co_tiles() * shape.ci_tiles()) as u64;
        let pixels = (shape.out_height() * shape.out_width()) as u64;
        Self {
            bias_loads: 1,
            weight_tile_loads: tile_pairs,
            rows_pushed: tile_pairs * shape.height as u64,
            windows_built: tile_pairs * pixels,
            mac_ops: shape.mac_count(),
            accumulator_seeds: shape.co_tiles() as u64 * pixels,
            outputs_written: shape.output_len() as u64,
        }
    }

    /// Bytes read from the caller's tensors (input rows, weight slices, bias).
    pub fn bytes_read(&self, shape: &ConvShape) -> u64 {
        let row_bytes = (shape.width * shape.ci_tile) as u64;
        let tile_bytes = (shape.co_tile * shape.ci_tile * shape.kernel * shape.kernel) as u64;
        self.rows_pushed * row_bytes
            + self.weight_tile_loads * tile_bytes
            + self.bias_loads * shape.bias_len() as u64 * 4
    }
}

impl AddAssign for EngineStats {
    fn add_assign(&mut self, rhs: Self) {
        self.bias_loads += rhs.bias_loads;
        self.weight_tile_loads += rhs.weight_tile_loads;
        self.rows_pushed += rhs.rows_pushed;
        self.windows_built += rhs.windows_built;
        self.mac_ops += rhs.mac_ops;
        self.accumulator_seeds += rhs.accumulator_seeds;
        self.outputs_written += rhs.outputs_written;
    }
}
