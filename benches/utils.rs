#![allow(dead_code)]

use rand::Rng;

/// Throughput in GMAC/s.
pub fn gmacs(macs: u64, duration_secs: f64) -> f64 {
    macs as f64 / duration_secs / 1e9
}

/// Memory throughput in GiB/s.
pub fn throughput_gibs(bytes: u64, duration_secs: f64) -> f64 {
    bytes as f64 / duration_secs / (1024.0 * 1024.0 * 1024.0)
}

/// Bytes one convolution touches at minimum: input, weights, bias, output.
pub fn conv_rw_bytes(input: usize, weights: usize, bias: usize, output: usize) -> u64 {
    (input + weights + bias * 4 + output) as u64
}

/// Uniform int8 vector over the full range.
pub fn random_i8_vec(n: usize) -> Vec<i8> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen::<i8>()).collect()
}

/// Uniform int32 vector in `[-bound, bound]`.
pub fn random_i32_vec(n: usize, bound: i32) -> Vec<i32> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range(-bound..=bound)).collect()
}
