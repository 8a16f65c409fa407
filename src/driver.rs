//! Register-level driver for the programmable-logic convolution core.
//!
//! The core exposes an AXI-lite control block: a control word at offset 0
//! and four 64-bit buffer addresses split into low/high 32-bit registers.
//! The host writes the addresses, raises `ap_start`, then polls `ap_done`.

use std::fmt;

use crate::accelerator::{ConvAccelerator, ConvBuffers, ControlStatus};
use crate::error::{ConvError, ConvResult};
use crate::types::{ConvShape, YOLO_LAYER};

pub const DEFAULT_BASE: u64 = 0xA000_0000;
pub const DEFAULT_MAP_SIZE: usize = 0x1_0000;

pub const REG_CTRL: usize = 0x00;
pub const REG_INPUT_LO: usize = 0x10;
pub const REG_INPUT_HI: usize = 0x14;
pub const REG_OUTPUT_LO: usize = 0x1C;
pub const REG_OUTPUT_HI: usize = 0x20;
pub const REG_WEIGHTS_LO: usize = 0x28;
pub const REG_WEIGHTS_HI: usize = 0x2C;
pub const REG_BIAS_LO: usize = 0x34;
pub const REG_BIAS_HI: usize = 0x38;

pub const CTRL_AP_START: u32 = 1 << 0;
pub const CTRL_AP_DONE: u32 = 1 << 1;

/// 32-bit register access at byte offsets inside the control block.
pub trait RegisterBus {
    fn read32(&self, offset: usize) -> ConvResult<u32>;

    fn write32(&mut self, offset: usize, value: u32) -> ConvResult<()>;

    /// Write a 64-bit value as a low/high register pair.
    fn write64(&mut self, lo: usize, hi: usize, value: u64) -> ConvResult<()> {
        self.write32(lo, value as u32)?;
        self.write32(hi, (value >> 32) as u32)
    }
}

/// Maps a host virtual address to the address the core masters on the bus.
pub trait AddressTranslator {
    fn to_device(&self, host: usize) -> ConvResult<u64>;
}

/// Host and device see the same addresses.
///
/// Only valid for buffers in physically contiguous, uncached memory that the
/// platform maps one-to-one (CMA or udmabuf regions on a typical board).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapping;

impl AddressTranslator for IdentityMapping {
    #[inline]
    fn to_device(&self, host: usize) -> ConvResult<u64> {
        Ok(host as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Physical base of the control block.
    pub base: u64,
    /// Size of the mapped register window.
    pub map_size: usize,
    /// Reads of the control word before giving up on `ap_done`.
    pub max_polls: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            map_size: DEFAULT_MAP_SIZE,
            max_polls: 50_000_000,
        }
    }
}

/// The hardware core behind [`ConvAccelerator`].
pub struct MmioAccelerator<B: RegisterBus, T: AddressTranslator = IdentityMapping> {
    bus: B,
    translator: T,
    config: DriverConfig,
    shape: ConvShape,
    status: ControlStatus,
}

impl<B: RegisterBus, T: AddressTranslator> fmt::Debug for MmioAccelerator<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmioAccelerator")
            .field("config", &self.config)
            .field("shape", &self.shape)
            .field("status", &self.status)
            .finish()
    }
}

impl<B: RegisterBus> MmioAccelerator<B, IdentityMapping> {
    /// Driver for the synthesized detector-layer core.
    pub fn new(bus: B, config: DriverConfig) -> Self {
        Self::with_translator(bus, IdentityMapping, YOLO_LAYER, config)
    }
}

impl<B: RegisterBus, T: AddressTranslator> MmioAccelerator<B, T> {
    pub fn with_translator(bus: B, translator: T, shape: ConvShape, config: DriverConfig) -> Self {
        Self {
            bus,
            translator,
            config,
            shape,
            status: ControlStatus::Idle,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Re-read the control word.
    ///
    /// After a timeout the driver stays `Busy` and refuses new work until this
    /// observes `ap_done`.
    pub fn refresh_status(&mut self) -> ConvResult<ControlStatus> {
        let ctrl = self.bus.read32(REG_CTRL)?;
        if ctrl & CTRL_AP_DONE != 0 {
            self.status = ControlStatus::Done;
        } else if ctrl & CTRL_AP_START == 0 && self.status != ControlStatus::Busy {
            self.status = ControlStatus::Idle;
        }
        Ok(self.status)
    }

    fn program_addresses(&mut self, buffers: &ConvBuffers<'_>) -> ConvResult<()> {
        let input = self.translator.to_device(buffers.input.as_ptr() as usize)?;
        let output = self.translator.to_device(buffers.output.as_ptr() as usize)?;
        let weights = self.translator.to_device(buffers.weights.as_ptr() as usize)?;
        let bias = self.translator.to_device(buffers.bias.as_ptr() as usize)?;

        self.bus.write64(REG_INPUT_LO, REG_INPUT_HI, input)?;
        self.bus.write64(REG_OUTPUT_LO, REG_OUTPUT_HI, output)?;
        self.bus.write64(REG_WEIGHTS_LO, REG_WEIGHTS_HI, weights)?;
        self.bus.write64(REG_BIAS_LO, REG_BIAS_HI, bias)?;
        log::debug!(
            "programmed buffers: in={:#x} out={:#x} wgt={:#x} bias={:#x}",
            input,
            output,
            weights,
            bias
        );
        Ok(())
    }

    fn wait_done(&mut self) -> ConvResult<u64> {
        for polls in 1..=self.config.max_polls {
            if self.bus.read32(REG_CTRL)? & CTRL_AP_DONE != 0 {
                return Ok(polls);
            }
            std::hint::spin_loop();
        }
        Err(ConvError::Timeout {
            polls: self.config.max_polls,
        })
    }
}

impl<B: RegisterBus, T: AddressTranslator> ConvAccelerator for MmioAccelerator<B, T> {
    fn name(&self) -> &str {
        "mmio"
    }

    fn shape(&self) -> ConvShape {
        self.shape
    }

    fn status(&self) -> ControlStatus {
        self.status
    }

    fn invoke(&mut self, buffers: ConvBuffers<'_>) -> ConvResult<()> {
        if self.status == ControlStatus::Busy {
            return Err(ConvError::Busy);
        }
        buffers.validate(&self.shape)?;
        self.program_addresses(&buffers)?;

        self.bus.write32(REG_CTRL, CTRL_AP_START)?;
        self.status = ControlStatus::Busy;

        match self.wait_done() {
            Ok(polls) => {
                log::info!("{} core finished after {} polls", self.name(), polls);
                self.status = ControlStatus::Done;
                Ok(())
            }
            Err(err) => {
                log::warn!("{} core: {}", self.name(), err);
                Err(err)
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use dev_mem::DevMemBus;

#[cfg(target_os = "linux")]
mod dev_mem {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    use memmap2::{MmapMut, MmapOptions};

    use super::{DriverConfig, RegisterBus};
    use crate::error::{ConvError, ConvResult};

    /// Control block mapped from `/dev/mem`. Needs root.
    pub struct DevMemBus {
        map: MmapMut,
    }

    impl DevMemBus {
        pub fn open(config: &DriverConfig) -> ConvResult<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_SYNC)
                .open("/dev/mem")?;
            let map = unsafe {
                MmapOptions::new()
                    .offset(config.base)
                    .len(config.map_size)
                    .map_mut(&file)?
            };
            log::info!(
                "mapped {:#x} bytes of registers at {:#x}",
                config.map_size,
                config.base
            );
            Ok(Self { map })
        }

        fn check(&self, offset: usize) -> ConvResult<()> {
            if offset % 4 != 0 || offset + 4 > self.map.len() {
                return Err(ConvError::Device(format!(
                    "register offset {:#x} outside {:#x}-byte window",
                    offset,
                    self.map.len()
                )));
            }
            Ok(())
        }
    }

    impl RegisterBus for DevMemBus {
        fn read32(&self, offset: usize) -> ConvResult<u32> {
            self.check(offset)?;
            // SAFETY: offset is 4-aligned and inside the mapping; the mapping
            // base is page aligned.
            Ok(unsafe { std::ptr::read_volatile(self.map.as_ptr().add(offset) as *const u32) })
        }

        fn write32(&mut self, offset: usize, value: u32) -> ConvResult<()> {
            self.check(offset)?;
            // SAFETY: see read32.
            unsafe {
                std::ptr::write_volatile(self.map.as_mut_ptr().add(offset) as *mut u32, value);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Register file that raises `ap_done` after a fixed number of reads.
    struct FakeBus {
        regs: HashMap<usize, u32>,
        done_after: Option<u64>,
        reads_since_start: Cell<u64>,
    }

    impl FakeBus {
        fn new(done_after: Option<u64>) -> Self {
            Self {
                regs: HashMap::new(),
                done_after,
                reads_since_start: Cell::new(0),
            }
        }

        fn reg(&self, offset: usize) -> u32 {
            self.regs.get(&offset).copied().unwrap_or(0)
        }
    }

    impl RegisterBus for FakeBus {
        fn read32(&self, offset: usize) -> ConvResult<u32> {
            let mut value = self.reg(offset);
            if offset == REG_CTRL && value & CTRL_AP_START != 0 {
                let reads = self.reads_since_start.get() + 1;
                self.reads_since_start.set(reads);
                if self.done_after.is_some_and(|n| reads >= n) {
                    value |= CTRL_AP_DONE;
                }
            }
            Ok(value)
        }

        fn write32(&mut self, offset: usize, value: u32) -> ConvResult<()> {
            if offset == REG_CTRL {
                self.reads_since_start.set(0);
            }
            self.regs.insert(offset, value);
            Ok(())
        }
    }

    struct OffsetMapping(u64);

    impl AddressTranslator for OffsetMapping {
        fn to_device(&self, host: usize) -> ConvResult<u64> {
            Ok(host as u64 + self.0)
        }
    }

    fn tiny_shape() -> ConvShape {
        ConvShape {
            height: 3,
            width: 3,
            in_channels: 1,
            out_channels: 1,
            kernel: 3,
            ci_tile: 1,
            co_tile: 1,
        }
    }

    #[test]
    fn test_invoke_programs_registers_and_completes() {
        let shape = tiny_shape();
        let config = DriverConfig {
            max_polls: 100,
            ..DriverConfig::default()
        };
        let mut acc = MmioAccelerator::with_translator(
            FakeBus::new(Some(5)),
            OffsetMapping(0x1_0000_0000),
            shape,
            config,
        );
        let input = vec![0i8; shape.input_len()];
        let weights = vec![0i8; shape.weight_len()];
        let bias = vec![0i32; shape.bias_len()];
        let mut output = vec![0i8; shape.output_len()];
        let out_ptr = output.as_ptr() as u64 + 0x1_0000_0000;

        acc.invoke(ConvBuffers {
            input: &input,
            output: &mut output,
            weights: &weights,
            bias: &bias,
        })
        .unwrap();

        let bus = acc.bus();
        assert_eq!(acc.status(), ControlStatus::Done);
        assert_eq!(bus.reg(REG_CTRL), CTRL_AP_START);
        assert_eq!(bus.reg(REG_OUTPUT_LO), out_ptr as u32);
        assert_eq!(bus.reg(REG_OUTPUT_HI), (out_ptr >> 32) as u32);
        let in_ptr = input.as_ptr() as u64 + 0x1_0000_0000;
        assert_eq!(bus.reg(REG_INPUT_LO), in_ptr as u32);
        assert_eq!(bus.reg(REG_INPUT_HI), (in_ptr >> 32) as u32);
        assert_eq!(bus.reads_since_start.get(), 5);
    }

    #[test]
    fn test_timeout_is_reported_and_blocks_new_work() {
        let shape = tiny_shape();
        let config = DriverConfig {
            max_polls: 8,
            ..DriverConfig::default()
        };
        let mut acc =
            MmioAccelerator::with_translator(FakeBus::new(None), IdentityMapping, shape, config);
        let input = vec![0i8; shape.input_len()];
        let weights = vec![0i8; shape.weight_len()];
        let bias = vec![0i32; shape.bias_len()];
        let mut output = vec![0i8; shape.output_len()];

        let err = acc
            .invoke(ConvBuffers {
                input: &input,
                output: &mut output,
                weights: &weights,
                bias: &bias,
            })
            .unwrap_err();
        assert!(matches!(err, ConvError::Timeout { polls: 8 }));
        assert_eq!(acc.status(), ControlStatus::Busy);

        let err = acc
            .invoke(ConvBuffers {
                input: &input,
                output: &mut output,
                weights: &weights,
                bias: &bias,
            })
            .unwrap_err();
        assert!(matches!(err, ConvError::Busy));
    }

    #[test]
    fn test_refresh_status_sees_late_done() {
        let shape = tiny_shape();
        let config = DriverConfig {
            max_polls: 2,
            ..DriverConfig::default()
        };
        let mut acc =
            MmioAccelerator::with_translator(FakeBus::new(Some(4)), IdentityMapping, shape, config);
        let input = vec![0i8; shape.input_len()];
        let weights = vec![0i8; shape.weight_len()];
        let bias = vec![0i32; shape.bias_len()];
        let mut output = vec![0i8; shape.output_len()];

        assert!(acc
            .invoke(ConvBuffers {
                input: &input,
                output: &mut output,
                weights: &weights,
                bias: &bias,
            })
            .is_err());
        // Reads 3 and 4.
        assert_eq!(acc.refresh_status().unwrap(), ControlStatus::Busy);
        assert_eq!(acc.refresh_status().unwrap(), ControlStatus::Done);
    }

    #[test]
    fn test_default_config_matches_board_layout() {
        let config = DriverConfig::default();
        assert_eq!(config.base, 0xA000_0000);
        assert_eq!(config.map_size, 0x10000);
        let acc = MmioAccelerator::new(FakeBus::new(Some(1)), config);
        assert_eq!(acc.shape(), YOLO_LAYER);
        assert_eq!(acc.status(), ControlStatus::Idle);
    }

    #[test]
    fn test_shape_mismatch_touches_no_registers() {
        let mut acc = MmioAccelerator::new(FakeBus::new(Some(1)), DriverConfig::default());
        let mut output = vec![0i8; 4];
        let err = acc
            .invoke(ConvBuffers {
                input: &[],
                output: &mut output,
                weights: &[],
                bias: &[],
            })
            .unwrap_err();
        assert!(matches!(err, ConvError::ShapeMismatch(_)));
        assert!(acc.bus().regs.is_empty());
    }
}
