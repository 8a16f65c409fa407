//! qconv-kernels: tiled int8 convolution engine for a single 3x3 detector layer.
//!
//! This crate provides a software model of a line-buffer convolution
//! accelerator with:
//! - **Compile-time geometry**: every on-chip buffer is a const-generic array;
//!   invalid tiling fails to build
//! - **Bit-exact results**: wrapping int32 accumulation, `>> 8` then saturate,
//!   checked against the scalar golden reference in `qconv-scalar-ops`
//! - **Explicit schedule**: `(co0, ci0)` tile passes and a checked pipeline
//!   stage machine
//! - **Device path**: a register-level driver for the synthesized core
//!
//! # Quick Start
//!
//! ```ignore
//! use qconv_kernels::{harness, ConvTensors, EngineConfig, YoloSoftwareAccelerator, YOLO_LAYER};
//!
//! let mut acc = YoloSoftwareAccelerator::new(EngineConfig::from_env()?);
//! let report = harness::validate(&mut acc, &ConvTensors::deterministic(YOLO_LAYER), 10)?;
//! std::process::exit(report.exit_code());
//! ```

pub mod accelerator;
pub mod driver;
pub mod engine;
pub mod error;
pub mod harness;
pub mod quant;
pub mod tensors;
pub mod types;
pub mod validation;

pub use accelerator::{
    ConvAccelerator, ConvBuffers, ControlStatus, SoftwareAccelerator, YoloSoftwareAccelerator,
};
pub use driver::{AddressTranslator, DriverConfig, IdentityMapping, MmioAccelerator, RegisterBus};
#[cfg(target_os = "linux")]
pub use driver::DevMemBus;
pub use engine::stats::EngineStats;
pub use engine::{ConvEngine, YoloConvEngine};
pub use error::{ConvError, ConvResult};
pub use harness::{compare_outputs, ConvTensors, Mismatch, MismatchReport};
pub use quant::{requantize, REQUANT_SHIFT};
pub use tensors::{Activations, BiasVector, ConvWeights};
pub use types::{ConvShape, EngineConfig, Schedule, YOLO_LAYER};
