//! Caller-owned tensor containers for one convolution invocation.
//!
//! Thin wrappers around `Vec<i8>` / `Vec<i32>` with shape metadata and
//! `#[inline(always)]` accessors. The engine only ever sees the raw slices.

use crate::types::ConvShape;

/// Activations stored channel-minor: `[height, width, channels]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activations {
    pub data: Vec<i8>,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Activations {
    #[inline(always)]
    pub fn new(data: Vec<i8>, height: usize, width: usize, channels: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            height * width * channels,
            "Data length must match height * width * channels"
        );
        Self { data, height, width, channels }
    }

    #[inline(always)]
    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        Self {
            data: vec![0; height * width * channels],
            height,
            width,
            channels,
        }
    }

    /// Input tensor for `shape`, filled from `f(flat_index)`.
    pub fn input_from_fn(shape: &ConvShape, f: impl FnMut(usize) -> i8) -> Self {
        let data = (0..shape.input_len()).map(f).collect();
        Self::new(data, shape.height, shape.width, shape.in_channels)
    }

    /// Zeroed output tensor for `shape`.
    pub fn output_for(shape: &ConvShape) -> Self {
        Self::zeros(shape.out_height(), shape.out_width(), shape.out_channels)
    }

    /// `((y*W + x)*C) + c`
    #[inline(always)]
    pub fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }

    #[inline(always)]
    pub fn get(&self, y: usize, x: usize, c: usize) -> i8 {
        self.data[self.index(y, x, c)]
    }

    /// All channels of one pixel.
    #[inline(always)]
    pub fn pixel(&self, y: usize, x: usize) -> &[i8] {
        let start = self.index(y, x, 0);
        &self.data[start..start + self.channels]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[i8] {
        &self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [i8] {
        &mut self.data
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Convolution kernels: `[out_channels, in_channels, kernel, kernel]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvWeights {
    pub data: Vec<i8>,
    pub out_channels: usize,
    pub in_channels: usize,
    pub kernel: usize,
}

impl ConvWeights {
    #[inline(always)]
    pub fn new(data: Vec<i8>, out_channels: usize, in_channels: usize, kernel: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            out_channels * in_channels * kernel * kernel,
            "Data length must match out_channels * in_channels * kernel * kernel"
        );
        Self { data, out_channels, in_channels, kernel }
    }

    pub fn from_fn(shape: &ConvShape, f: impl FnMut(usize) -> i8) -> Self {
        let data = (0..shape.weight_len()).map(f).collect();
        Self::new(data, shape.out_channels, shape.in_channels, shape.kernel)
    }

    /// `((co*CIN + ci)*K + ky)*K + kx`
    #[inline(always)]
    pub fn index(&self, co: usize, ci: usize, ky: usize, kx: usize) -> usize {
        ((co * self.in_channels + ci) * self.kernel + ky) * self.kernel + kx
    }

    #[inline(always)]
    pub fn get(&self, co: usize, ci: usize, ky: usize, kx: usize) -> i8 {
        self.data[self.index(co, ci, ky, kx)]
    }

    /// The `K x K` taps of one `(co, ci)` pair.
    #[inline(always)]
    pub fn taps(&self, co: usize, ci: usize) -> &[i8] {
        let start = self.index(co, ci, 0, 0);
        &self.data[start..start + self.kernel * self.kernel]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[i8] {
        &self.data
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One int32 bias per output channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiasVector {
    pub data: Vec<i32>,
}

impl BiasVector {
    #[inline(always)]
    pub fn new(data: Vec<i32>) -> Self {
        Self { data }
    }

    #[inline(always)]
    pub fn zeros(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    pub fn from_fn(shape: &ConvShape, f: impl FnMut(usize) -> i32) -> Self {
        Self::new((0..shape.bias_len()).map(f).collect())
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
