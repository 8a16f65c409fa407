//! Convolution geometry and run-time configuration.

use std::env;

use crate::error::{ConvError, ConvResult};
use crate::validation::{
    compute_tensor_len, validate_accumulator_headroom, validate_conv_dims, validate_tile,
};

/// Environment override for [`Schedule`].
pub const SCHEDULE_ENV: &str = "QCONV_SCHEDULE";
/// Environment override for [`EngineConfig::max_reported_mismatches`].
pub const MAX_MISMATCHES_ENV: &str = "QCONV_MAX_MISMATCHES";

/// Geometry of one engine instance.
///
/// Activations are `[H, W, C]` channel-minor, weights `[COUT, CIN, K, K]`.
/// The output is the valid convolution: `(H-K+1) x (W-K+1) x COUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvShape {
    pub height: usize,
    pub width: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    /// Input channels resident in the line buffer at once.
    pub ci_tile: usize,
    /// Output channels accumulated side by side.
    pub co_tile: usize,
}

/// The detector layer the hardware datapath is built for.
pub const YOLO_LAYER: ConvShape = ConvShape {
    height: 26,
    width: 26,
    in_channels: 128,
    out_channels: 128,
    kernel: 3,
    ci_tile: 8,
    co_tile: 4,
};

impl ConvShape {
    pub fn validate(&self) -> ConvResult<()> {
        validate_conv_dims(self.height, self.width, self.kernel)
            .and_then(|_| validate_tile(self.in_channels, self.ci_tile, "in_channels"))
            .and_then(|_| validate_tile(self.out_channels, self.co_tile, "out_channels"))
            .and_then(|_| validate_accumulator_headroom(self.in_channels, self.kernel))
            .and_then(|_| compute_tensor_len(&[self.height, self.width, self.in_channels], "input"))
            .and_then(|_| {
                compute_tensor_len(
                    &[self.out_channels, self.in_channels, self.kernel, self.kernel],
                    "weights",
                )
            })
            .map(|_| ())
            .map_err(ConvError::InvalidConfig)
    }

    #[inline(always)]
    pub const fn out_height(&self) -> usize {
        self.height - self.kernel + 1
    }

    #[inline(always)]
    pub const fn out_width(&self) -> usize {
        self.width - self.kernel + 1
    }

    #[inline(always)]
    pub const fn input_len(&self) -> usize {
        self.height * self.width * self.in_channels
    }

    #[inline(always)]
    pub const fn output_len(&self) -> usize {
        self.out_height() * self.out_width() * self.out_channels
    }

    #[inline(always)]
    pub const fn weight_len(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel * self.kernel
    }

    #[inline(always)]
    pub const fn bias_len(&self) -> usize {
        self.out_channels
    }

    #[inline(always)]
    pub const fn ci_tiles(&self) -> usize {
        self.in_channels / self.ci_tile
    }

    #[inline(always)]
    pub const fn co_tiles(&self) -> usize {
        self.out_channels / self.co_tile
    }

    /// `(y*W + x)*CIN + c`
    #[inline(always)]
    pub const fn input_index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.width + x) * self.in_channels + c
    }

    /// `((co*CIN + ci)*K + ky)*K + kx`
    #[inline(always)]
    pub const fn weight_index(&self, co: usize, ci: usize, ky: usize, kx: usize) -> usize {
        ((co * self.in_channels + ci) * self.kernel + ky) * self.kernel + kx
    }

    /// `(oy*OW + ox)*COUT + co`
    #[inline(always)]
    pub const fn output_index(&self, oy: usize, ox: usize, co: usize) -> usize {
        (oy * self.out_width() + ox) * self.out_channels + co
    }

    /// Multiply-accumulates in one full invocation.
    pub const fn mac_count(&self) -> u64 {
        (self.output_len() * self.in_channels * self.kernel * self.kernel) as u64
    }
}

/// How output-channel tiles are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// One worker walks every tile pair in order.
    #[default]
    Sequential,
    /// Output-channel tiles run concurrently on the rayon pool.
    Parallel,
}

impl Schedule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("sequential") || value.eq_ignore_ascii_case("seq") {
            Some(Self::Sequential)
        } else if value.eq_ignore_ascii_case("parallel") || value.eq_ignore_ascii_case("par") {
            Some(Self::Parallel)
        } else {
            None
        }
    }
}

/// Run-time knobs. Geometry is never configurable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub schedule: Schedule,
    /// Mismatches listed individually by the validation harness.
    pub max_reported_mismatches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::Sequential,
            max_reported_mismatches: 10,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `QCONV_SCHEDULE` and `QCONV_MAX_MISMATCHES`.
    pub fn from_env() -> ConvResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> ConvResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(SCHEDULE_ENV) {
            config.schedule = Schedule::parse(&value).ok_or(ConvError::InvalidOverride {
                name: SCHEDULE_ENV,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(MAX_MISMATCHES_ENV) {
            config.max_reported_mismatches =
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ConvError::InvalidOverride {
                        name: MAX_MISMATCHES_ENV,
                        value: value.clone(),
                    })?;
        }

        Ok(config)
    }
}
