//! Tiled line-buffer convolution engine.
//!
//! Software model of the hardware datapath: fixed on-chip buffers sized by
//! const generics, a `(co0, ci0)` tile schedule, a `K`-row ring buffer fed
//! one image row at a time, and a MAC array over `CO_TILE` output lanes.
//!
//! ```ignore
//! use qconv_kernels::{ConvBuffers, YoloConvEngine, EngineConfig};
//!
//! let mut engine = YoloConvEngine::new(EngineConfig::default());
//! let stats = engine.run(ConvBuffers { input, output, weights, bias })?;
//! ```

pub mod line_buffer;
pub mod mac;
pub mod schedule;
pub mod stats;
pub mod weight_tile;
pub mod window;
pub mod writer;

use rayon::prelude::*;

use crate::accelerator::ConvBuffers;
use crate::error::ConvResult;
use crate::types::{ConvShape, EngineConfig, Schedule};

use line_buffer::{LineBuffer, ScanCursor};
use mac::PartialSums;
use schedule::{Stage, StageTracker, TilePass, TileSchedule};
use stats::EngineStats;
use weight_tile::WeightTile;
use window::Window;
use writer::{scatter_tile_plane, OutputWriter};

/// Engine for the detector layer: 26x26x128 -> 24x24x128, 3x3 kernel.
pub type YoloConvEngine = ConvEngine<26, 26, 128, 128, 3, 8, 4>;

/// Bias for every output channel, held for the whole invocation.
#[derive(Debug, Clone)]
pub struct BiasBank<const COUT: usize> {
    values: [i32; COUT],
}

impl<const COUT: usize> BiasBank<COUT> {
    pub const fn new() -> Self {
        Self { values: [0; COUT] }
    }

    #[inline]
    pub fn load(&mut self, bias: &[i32]) {
        self.values.copy_from_slice(&bias[..COUT]);
    }

    /// Biases of output channels `co0..co0+tile`.
    #[inline(always)]
    pub fn tile(&self, co0: usize, tile: usize) -> &[i32] {
        &self.values[co0..co0 + tile]
    }
}

impl<const COUT: usize> Default for BiasBank<COUT> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffers and scan state for one stream of tile pairs.
///
/// The sequential schedule reuses a single worker for every output tile;
/// the parallel schedule gives each output tile its own.
pub(crate) struct TileWorker<
    const H: usize,
    const W: usize,
    const CIN: usize,
    const K: usize,
    const CI_TILE: usize,
    const CO_TILE: usize,
> {
    weights: WeightTile<CO_TILE, CI_TILE, K>,
    lines: LineBuffer<K, W, CI_TILE>,
    window: Window<K, CI_TILE>,
    partials: PartialSums<CO_TILE>,
    stages: StageTracker,
    stats: EngineStats,
}

impl<
        const H: usize,
        const W: usize,
        const CIN: usize,
        const K: usize,
        const CI_TILE: usize,
        const CO_TILE: usize,
    > TileWorker<H, W, CIN, K, CI_TILE, CO_TILE>
{
    const MACS_PER_WINDOW: u64 = (CO_TILE * CI_TILE * K * K) as u64;

    pub(crate) fn new() -> Self {
        Self {
            weights: WeightTile::new(),
            lines: LineBuffer::new(),
            window: Window::new(),
            partials: PartialSums::new(H + 1 - K, W + 1 - K),
            stages: StageTracker::new(),
            stats: EngineStats::default(),
        }
    }

    /// Bias is resident; tile passes may start.
    pub(crate) fn begin(&mut self) {
        self.stages.advance(Stage::LoadBias);
        self.stats = EngineStats::default();
    }

    pub(crate) fn finish(&mut self) -> EngineStats {
        self.stages.advance(Stage::Done);
        self.stats
    }

    /// All input-tile passes of the output tile at `co0`.
    ///
    /// `bias` holds the `CO_TILE` biases of that tile. Results land in
    /// channels `out_co0..out_co0+CO_TILE` of `writer`'s plane.
    pub(crate) fn run_output_tile(
        &mut self,
        co0: usize,
        input: &[i8],
        weights: &[i8],
        bias: &[i32],
        writer: &mut OutputWriter<'_>,
        out_co0: usize,
    ) {
        for pass in TileSchedule::output_tile(co0, CO_TILE, CIN, CI_TILE) {
            self.run_pass(pass, input, weights, bias, writer, out_co0);
        }
    }

    fn run_pass(
        &mut self,
        pass: TilePass,
        input: &[i8],
        weights: &[i8],
        bias: &[i32],
        writer: &mut OutputWriter<'_>,
        out_co0: usize,
    ) {
        let origin = pass.origin();

        self.stages.advance(Stage::LoadWeights(origin));
        self.weights.load(weights, CIN, pass.co0, pass.ci0);
        self.stats.weight_tile_loads += 1;

        self.stages.advance(Stage::ScanRows(origin));
        // The ring is rebuilt from scratch for every input tile.
        let mut cursor = ScanCursor::<K>::start();
        for y in 0..H {
            self.lines.push_row(&mut cursor, input, CIN, y, pass.ci0);
            self.stats.rows_pushed += 1;
            if !cursor.window_ready() {
                continue;
            }

            let oy = y + 1 - K;
            for x in (K - 1)..W {
                let ox = x + 1 - K;
                self.window.assemble(&self.lines, &cursor, x);
                self.stats.windows_built += 1;

                debug_assert!(self.weights.is_loaded_for(pass.co0, pass.ci0));
                let bank = self.partials.bank_mut(oy, ox);
                if pass.seed {
                    bank.seed(bias);
                    self.stats.accumulator_seeds += 1;
                } else {
                    debug_assert_eq!(
                        bank.tiles_accumulated(),
                        pass.ci0 / CI_TILE,
                        "pixel ({oy}, {ox}) missed an input tile"
                    );
                }

                bank.accumulate(&self.window, &self.weights);
                self.stats.mac_ops += Self::MACS_PER_WINDOW;

                if pass.finalize {
                    debug_assert_eq!(bank.tiles_accumulated(), CIN / CI_TILE);
                    writer.write(oy, ox, out_co0, &bank.requantize());
                    self.stats.outputs_written += CO_TILE as u64;
                }
            }
        }
    }
}

/// Tiled int8 convolution engine with fixed geometry.
///
/// All buffers are owned here and sized at compile time; the caller's
/// tensors are only borrowed for the duration of [`ConvEngine::run`].
/// Invalid geometry (`CIN % CI_TILE != 0`, kernel larger than the image, ...)
/// fails to compile.
pub struct ConvEngine<
    const H: usize,
    const W: usize,
    const CIN: usize,
    const COUT: usize,
    const K: usize,
    const CI_TILE: usize,
    const CO_TILE: usize,
> {
    config: EngineConfig,
    bias: BiasBank<COUT>,
    worker: TileWorker<H, W, CIN, K, CI_TILE, CO_TILE>,
    last_stats: EngineStats,
}

impl<
        const H: usize,
        const W: usize,
        const CIN: usize,
        const COUT: usize,
        const K: usize,
        const CI_TILE: usize,
        const CO_TILE: usize,
    > ConvEngine<H, W, CIN, COUT, K, CI_TILE, CO_TILE>
{
    const GEOMETRY_OK: () = {
        assert!(K > 0 && K <= H && K <= W, "kernel must fit inside the input");
        assert!(CI_TILE > 0 && CIN % CI_TILE == 0, "CIN must be a multiple of CI_TILE");
        assert!(CO_TILE > 0 && COUT % CO_TILE == 0, "COUT must be a multiple of CO_TILE");
        assert!(
            CIN * K * K <= i32::MAX as usize / (128 * 128),
            "int8 products of one pixel can overflow the int32 accumulator"
        );
    };

    pub const OUT_HEIGHT: usize = H + 1 - K;
    pub const OUT_WIDTH: usize = W + 1 - K;

    pub const SHAPE: ConvShape = ConvShape {
        height: H,
        width: W,
        in_channels: CIN,
        out_channels: COUT,
        kernel: K,
        ci_tile: CI_TILE,
        co_tile: CO_TILE,
    };

    pub fn new(config: EngineConfig) -> Self {
        let () = Self::GEOMETRY_OK;
        Self {
            config,
            bias: BiasBank::new(),
            worker: TileWorker::new(),
            last_stats: EngineStats::default(),
        }
    }

    #[inline(always)]
    pub fn shape(&self) -> ConvShape {
        Self::SHAPE
    }

    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.config.schedule = schedule;
    }

    /// Counters of the most recent completed run.
    #[inline(always)]
    pub fn last_stats(&self) -> EngineStats {
        self.last_stats
    }

    /// Run one full convolution.
    ///
    /// Buffer lengths are checked here, at the boundary. Past that point the
    /// run cannot fail: the schedule is fixed and always terminates.
    pub fn run(&mut self, buffers: ConvBuffers<'_>) -> ConvResult<EngineStats> {
        buffers.validate(&Self::SHAPE)?;
        let ConvBuffers {
            input,
            output,
            weights,
            bias,
        } = buffers;

        log::info!(
            "conv {}x{}x{} -> {}x{}x{} (k={}, tiles ci={} co={}, {} schedule)",
            H,
            W,
            CIN,
            Self::OUT_HEIGHT,
            Self::OUT_WIDTH,
            COUT,
            K,
            CI_TILE,
            CO_TILE,
            self.config.schedule.name()
        );

        self.bias.load(bias);
        let mut stats = EngineStats {
            bias_loads: 1,
            ..EngineStats::default()
        };

        stats += match self.config.schedule {
            Schedule::Sequential => self.run_sequential(input, weights, output),
            Schedule::Parallel => self.run_parallel(input, weights, output),
        };

        log::debug!(
            "conv done: {} weight tiles, {} rows, {} windows, {} MACs, {} outputs",
            stats.weight_tile_loads,
            stats.rows_pushed,
            stats.windows_built,
            stats.mac_ops,
            stats.outputs_written
        );
        self.last_stats = stats;
        Ok(stats)
    }

    fn run_sequential(&mut self, input: &[i8], weights: &[i8], output: &mut [i8]) -> EngineStats {
        let mut writer = OutputWriter::new(output, Self::OUT_WIDTH, COUT);
        self.worker.begin();
        for co0 in (0..COUT).step_by(CO_TILE) {
            self.worker.run_output_tile(
                co0,
                input,
                weights,
                self.bias.tile(co0, CO_TILE),
                &mut writer,
                co0,
            );
            log::debug!("output tile {}/{} done", co0 / CO_TILE + 1, COUT / CO_TILE);
        }
        debug_assert_eq!(writer.written(), Self::SHAPE.output_len() as u64);
        self.worker.finish()
    }

    fn run_parallel(&self, input: &[i8], weights: &[i8], output: &mut [i8]) -> EngineStats {
        let bias = &self.bias;
        let plane_len = Self::OUT_HEIGHT * Self::OUT_WIDTH * CO_TILE;

        let planes: Vec<(usize, Vec<i8>, EngineStats)> = (0..COUT / CO_TILE)
            .into_par_iter()
            .map(|tile| {
                let co0 = tile * CO_TILE;
                let mut worker = TileWorker::<H, W, CIN, K, CI_TILE, CO_TILE>::new();
                let mut plane = vec![0i8; plane_len];
                worker.begin();
                {
                    let mut writer = OutputWriter::new(&mut plane, Self::OUT_WIDTH, CO_TILE);
                    worker.run_output_tile(
                        co0,
                        input,
                        weights,
                        bias.tile(co0, CO_TILE),
                        &mut writer,
                        0,
                    );
                }
                (co0, plane, worker.finish())
            })
            .collect();

        let mut stats = EngineStats::default();
        for (co0, plane, tile_stats) in planes {
            scatter_tile_plane(&plane, output, COUT, co0, CO_TILE);
            stats += tile_stats;
        }
        log::debug!(
            "scattered {} output tiles on {} threads",
            COUT / CO_TILE,
            rayon::current_num_threads()
        );
        stats
    }
}
