//! Scalar operator implementations for the quantized convolution layer.
//!
//! These serve as the golden reference for correctness testing: every
//! optimised path in `qconv-kernels` must agree with them bit for bit.
//!
//! Nothing here is tiled, buffered or parallel. Each function is a direct
//! loop nest over the full tensors, compiled with `opt-level = 1` in release
//! builds (configured in the workspace root Cargo.toml) so the loop structure
//! stays recognisable.

pub mod conv;
pub mod requant;
