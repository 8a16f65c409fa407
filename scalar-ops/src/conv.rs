//! Direct 2D convolution reference (valid mode, stride 1, no padding).
//!
//! Layouts:
//! - input   `[H, W, CIN]`           `idx = (y*W + x)*CIN + ci`
//! - weights `[COUT, CIN, K, K]`     `idx = ((co*CIN + ci)*K + ky)*K + kx`
//! - bias    `[COUT]` int32
//! - output  `[OH, OW, COUT]`        `idx = (y*OW + x)*COUT + co`
//!
//! with `OH = H - K + 1`, `OW = W - K + 1`.

use crate::requant::scalar_requant_i8;

/// Geometry of one reference invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarConvDims {
    pub height: usize,
    pub width: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
}

impl ScalarConvDims {
    pub fn out_height(&self) -> usize {
        self.height - self.kernel + 1
    }

    pub fn out_width(&self) -> usize {
        self.width - self.kernel + 1
    }
}

/// Int8 convolution with int32 accumulation and `>> shift` requantization.
///
/// Six nested loops `(co, y, x, ci, ky, kx)`, bias-initialised accumulator,
/// wrapping 32-bit adds. Every output element is written.
///
/// Panics if any slice is shorter than the geometry requires.
#[inline(never)]
pub fn scalar_conv2d_i8(
    input: &[i8],
    weights: &[i8],
    bias: &[i32],
    output: &mut [i8],
    dims: ScalarConvDims,
    shift: u32,
) {
    let ScalarConvDims {
        width,
        in_channels,
        out_channels,
        kernel,
        ..
    } = dims;
    let out_h = dims.out_height();
    let out_w = dims.out_width();

    for co in 0..out_channels {
        for y in 0..out_h {
            for x in 0..out_w {
                let mut acc = bias[co];

                for ci in 0..in_channels {
                    for ky in 0..kernel {
                        for kx in 0..kernel {
                            let in_idx = ((y + ky) * width + (x + kx)) * in_channels + ci;
                            let w_idx = ((co * in_channels + ci) * kernel + ky) * kernel + kx;
                            let prod = input[in_idx] as i32 * weights[w_idx] as i32;
                            acc = acc.wrapping_add(prod);
                        }
                    }
                }

                let out_idx = (y * out_w + x) * out_channels + co;
                output[out_idx] = scalar_requant_i8(acc, shift);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_single_channel_identity_kernel() {
        // 3x3 input, centre-tap kernel: output is the centre sample scaled by 256 >> 8.
        let dims = ScalarConvDims {
            height: 3,
            width: 3,
            in_channels: 1,
            out_channels: 1,
            kernel: 3,
        };
        let input: Vec<i8> = (1..=9).collect();
        let mut weights = vec![0i8; 9];
        weights[4] = 1;
        let bias = vec![0i32];
        let mut out = vec![0i8; 1];

        scalar_conv2d_i8(&input, &weights, &bias, &mut out, dims, 0);
        assert_eq!(out, vec![5]);
    }

    #[test]
    fn test_conv_orientation_is_cross_correlation() {
        // Only the top-left tap is set, so each output picks the top-left sample of its window.
        let dims = ScalarConvDims {
            height: 4,
            width: 4,
            in_channels: 1,
            out_channels: 1,
            kernel: 3,
        };
        let input: Vec<i8> = (0..16).collect();
        let mut weights = vec![0i8; 9];
        weights[0] = 1;
        let mut out = vec![0i8; 4];

        scalar_conv2d_i8(&input, &weights, &[0], &mut out, dims, 0);
        assert_eq!(out, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_conv_bias_and_shift() {
        let dims = ScalarConvDims {
            height: 3,
            width: 3,
            in_channels: 2,
            out_channels: 2,
            kernel: 3,
        };
        let input = vec![1i8; 18];
        let weights = vec![1i8; 36];
        let bias = vec![0i32, -1000];
        let mut out = vec![0i8; 2];

        // acc = 18 (+ bias); 18 >> 8 = 0, (18 - 1000) >> 8 = floor(-982 / 256) = -4
        scalar_conv2d_i8(&input, &weights, &bias, &mut out, dims, 8);
        assert_eq!(out, vec![0, -4]);
    }

    #[test]
    fn test_conv_output_layout_channel_minor() {
        let dims = ScalarConvDims {
            height: 3,
            width: 4,
            in_channels: 1,
            out_channels: 3,
            kernel: 3,
        };
        let input = vec![0i8; 12];
        let weights = vec![0i8; 27];
        let bias = vec![256, 512, 768];
        let mut out = vec![0i8; 6];

        scalar_conv2d_i8(&input, &weights, &bias, &mut out, dims, 8);
        assert_eq!(out, vec![1, 2, 3, 1, 2, 3]);
    }
}
