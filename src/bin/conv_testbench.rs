//! Convolution testbench
//!
//! Runs the detector layer on the deterministic bring-up pattern and checks
//! every output against the scalar golden reference.
//!
//! Usage: `conv_testbench [--device]`. `--device` drives the core through
//! `/dev/mem` (Linux, root) instead of the software engine.

use std::process;
use std::time::Instant;

use qconv_kernels::harness::{self, ConvTensors};
use qconv_kernels::{ConvAccelerator, ConvResult, EngineConfig, YoloSoftwareAccelerator, YOLO_LAYER};

fn main() {
    env_logger::init();

    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    }
}

fn run() -> ConvResult<i32> {
    let config = EngineConfig::from_env()?;
    let use_device = std::env::args().skip(1).any(|arg| arg == "--device");

    let mut accelerator: Box<dyn ConvAccelerator> = if use_device {
        open_device()?
    } else {
        Box::new(YoloSoftwareAccelerator::new(config))
    };

    println!(
        "conv {}x{}x{} -> {}x{}x{} on {} ({})",
        YOLO_LAYER.height,
        YOLO_LAYER.width,
        YOLO_LAYER.in_channels,
        YOLO_LAYER.out_height(),
        YOLO_LAYER.out_width(),
        YOLO_LAYER.out_channels,
        accelerator.name(),
        config.schedule.name()
    );

    let tensors = ConvTensors::deterministic(YOLO_LAYER);

    let start = Instant::now();
    let output = harness::run_accelerator(accelerator.as_mut(), &tensors)?;
    let elapsed = start.elapsed();

    let reference = harness::reference_output(&tensors);
    let report = harness::compare_outputs(
        output.as_slice(),
        reference.as_slice(),
        config.max_reported_mismatches,
    );

    println!("{report}");
    println!(
        "convolution time: {:.3} ms ({:.2} GMAC/s)",
        elapsed.as_secs_f64() * 1e3,
        YOLO_LAYER.mac_count() as f64 / elapsed.as_secs_f64() / 1e9
    );
    Ok(report.exit_code())
}

#[cfg(target_os = "linux")]
fn open_device() -> ConvResult<Box<dyn ConvAccelerator>> {
    use qconv_kernels::{DevMemBus, DriverConfig, MmioAccelerator};

    let config = DriverConfig::default();
    let bus = DevMemBus::open(&config)?;
    Ok(Box::new(MmioAccelerator::new(bus, config)))
}

#[cfg(not(target_os = "linux"))]
fn open_device() -> ConvResult<Box<dyn ConvAccelerator>> {
    Err(qconv_kernels::ConvError::Device(
        "--device needs /dev/mem (Linux only)".to_string(),
    ))
}
