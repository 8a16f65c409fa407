//! Blocking start/done contract shared by the software engine and the device.

use crate::engine::ConvEngine;
use crate::error::{ConvError, ConvResult};
use crate::types::{ConvShape, EngineConfig};
use crate::validation::validate_input_len;

/// The four buffers of one invocation, all channel-minor.
#[derive(Debug)]
pub struct ConvBuffers<'a> {
    /// `[H, W, CIN]` activations.
    pub input: &'a [i8],
    /// `[OH, OW, COUT]` destination. Fully overwritten on success.
    pub output: &'a mut [i8],
    /// `[COUT, CIN, K, K]` kernels.
    pub weights: &'a [i8],
    /// `[COUT]` biases.
    pub bias: &'a [i32],
}

impl ConvBuffers<'_> {
    /// Check every buffer length against `shape`.
    pub fn validate(&self, shape: &ConvShape) -> ConvResult<()> {
        validate_input_len(self.input.len(), shape.input_len(), "input")
            .and_then(|_| validate_input_len(self.output.len(), shape.output_len(), "output"))
            .and_then(|_| validate_input_len(self.weights.len(), shape.weight_len(), "weights"))
            .and_then(|_| validate_input_len(self.bias.len(), shape.bias_len(), "bias"))
            .map_err(ConvError::ShapeMismatch)
    }
}

/// Control word as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlStatus {
    #[default]
    Idle,
    Busy,
    /// The last invocation completed and its output is valid.
    Done,
}

impl ControlStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ControlStatus::Idle => "idle",
            ControlStatus::Busy => "busy",
            ControlStatus::Done => "done",
        }
    }
}

/// A convolution unit driven by "start, then wait for done".
///
/// `invoke` returns only once the output buffer holds the full result (or
/// an error). There is no partial-completion state visible to the caller.
pub trait ConvAccelerator {
    fn name(&self) -> &str;

    fn shape(&self) -> ConvShape;

    fn status(&self) -> ControlStatus;

    fn invoke(&mut self, buffers: ConvBuffers<'_>) -> ConvResult<()>;
}

/// [`ConvEngine`] behind the accelerator contract.
pub struct SoftwareAccelerator<
    const H: usize,
    const W: usize,
    const CIN: usize,
    const COUT: usize,
    const K: usize,
    const CI_TILE: usize,
    const CO_TILE: usize,
> {
    engine: ConvEngine<H, W, CIN, COUT, K, CI_TILE, CO_TILE>,
    status: ControlStatus,
}

/// Software model of the detector-layer accelerator.
pub type YoloSoftwareAccelerator = SoftwareAccelerator<26, 26, 128, 128, 3, 8, 4>;

impl<
        const H: usize,
        const W: usize,
        const CIN: usize,
        const COUT: usize,
        const K: usize,
        const CI_TILE: usize,
        const CO_TILE: usize,
    > SoftwareAccelerator<H, W, CIN, COUT, K, CI_TILE, CO_TILE>
{
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: ConvEngine::new(config),
            status: ControlStatus::Idle,
        }
    }

    pub fn engine(&self) -> &ConvEngine<H, W, CIN, COUT, K, CI_TILE, CO_TILE> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ConvEngine<H, W, CIN, COUT, K, CI_TILE, CO_TILE> {
        &mut self.engine
    }
}

impl<
        const H: usize,
        const W: usize,
        const CIN: usize,
        const COUT: usize,
        const K: usize,
        const CI_TILE: usize,
        const CO_TILE: usize,
    > ConvAccelerator for SoftwareAccelerator<H, W, CIN, COUT, K, CI_TILE, CO_TILE>
{
    fn name(&self) -> &str {
        "software"
    }

    fn shape(&self) -> ConvShape {
        self.engine.shape()
    }

    fn status(&self) -> ControlStatus {
        self.status
    }

    fn invoke(&mut self, buffers: ConvBuffers<'_>) -> ConvResult<()> {
        if self.status == ControlStatus::Busy {
            return Err(ConvError::Busy);
        }
        // A rejected invocation leaves the previous status untouched.
        buffers.validate(&self.engine.shape())?;

        self.status = ControlStatus::Busy;
        match self.engine.run(buffers) {
            Ok(_) => {
                self.status = ControlStatus::Done;
                Ok(())
            }
            Err(err) => {
                self.status = ControlStatus::Idle;
                Err(err)
            }
        }
    }
}
