//! Sound subsystem seams
//!
//! The Z80 sound CPU and the YM2612/PSG synthesizer are external
//! collaborators. This module defines the traits the system drives them
//! through, the bus request / reset latches the 68000 sees at
//! `$A11100`/`$A11200`, and stand-ins used when no real core is attached.

use crate::bus::MemoryBus;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::Cpu;
use serde::Serialize;

/// Z80-class CPU attached to the sound window.
pub trait SoundCpu: Cpu<MemoryBus> {
    /// The 68000 requested (or released) the sound bus.
    fn set_bus_request(&mut self, requested: bool);

    /// The 68000 asserted (or released) the sound CPU reset line.
    fn set_reset(&mut self, asserted: bool);

    /// Level of the sound CPU interrupt line (held for the first VBlank line).
    fn set_interrupt(&mut self, _asserted: bool) {}
}

/// FM + PSG synthesizer as seen from the buses.
pub trait Synthesizer {
    /// Write one of the four FM ports (address/data for parts I and II).
    fn write(&mut self, port: u8, value: u8);

    /// Read the FM status byte.
    fn read(&mut self, port: u8) -> u8;

    /// Advance by one scanline.
    fn tick(&mut self);

    /// Write to the PSG through the VDP port window.
    fn write_psg(&mut self, _value: u8) {}

    fn reset(&mut self) {}
}

/// Bus request, reset and bank latches owned by the 68000 side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoundCpuControl {
    pub bus_requested: bool,
    pub reset_asserted: bool,
    /// 9-bit bank for the `$8000-$FFFF` ROM view, shifted in one bit at a time
    pub bank: u16,
}

impl SoundCpuControl {
    /// Power-on state: bus released, sound CPU held in reset.
    pub fn new() -> Self {
        Self {
            bus_requested: false,
            reset_asserted: true,
            bank: 0,
        }
    }

    /// Byte read at an offset within the `$A1xxxx` page.
    pub fn read(&self, offset: u16) -> u8 {
        match offset {
            // Bit 0 clear once the bus is granted
            0x1100 => !self.bus_requested as u8,
            0x1200 => !self.reset_asserted as u8,
            _ => 0x00,
        }
    }

    /// Byte write at an offset within the `$A1xxxx` page. Only the even
    /// byte of each register is decoded.
    pub fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0x1100 => {
                self.bus_requested = value & 0x01 != 0;
                log(LogCategory::Sound, LogLevel::Debug, || {
                    format!("Z80: bus request {}", self.bus_requested)
                });
            }
            0x1200 => {
                self.reset_asserted = value & 0x01 == 0;
                log(LogCategory::Sound, LogLevel::Debug, || {
                    format!("Z80: reset {}", self.reset_asserted)
                });
            }
            _ => {}
        }
    }

    /// The sound CPU is stopped while its bus is taken or reset is held.
    pub fn holds_sound_cpu(&self) -> bool {
        self.bus_requested || self.reset_asserted
    }

    /// Shift bit 0 of `value` into the top of the bank register.
    pub fn shift_bank_bit(&mut self, value: u8) {
        self.bank = ((self.bank >> 1) | (((value & 0x01) as u16) << 8)) & 0x1FF;
    }

    /// 68000 address of the start of the banked window.
    pub fn bank_base(&self) -> u32 {
        (self.bank as u32) << 15
    }
}

impl Default for SoundCpuControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in sound CPU that stays idle for its whole budget.
#[derive(Debug, Default)]
pub struct IdleSoundCpu {
    cycles: u64,
    bus_requested: bool,
    reset_asserted: bool,
    interrupt: bool,
}

impl IdleSoundCpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn interrupt_asserted(&self) -> bool {
        self.interrupt
    }
}

impl Cpu<MemoryBus> for IdleSoundCpu {
    fn reset(&mut self, _bus: &mut MemoryBus) {
        self.cycles = 0;
        self.interrupt = false;
    }

    fn execute(&mut self, _bus: &mut MemoryBus, budget: u32) -> u32 {
        self.cycles += budget as u64;
        budget
    }
}

impl SoundCpu for IdleSoundCpu {
    fn set_bus_request(&mut self, requested: bool) {
        self.bus_requested = requested;
    }

    fn set_reset(&mut self, asserted: bool) {
        self.reset_asserted = asserted;
    }

    fn set_interrupt(&mut self, asserted: bool) {
        self.interrupt = asserted;
    }
}

/// Synthesizer stand-in that latches register writes and produces no audio.
#[derive(Debug, Clone)]
pub struct LatchingSynth {
    address: [u8; 2],
    registers: [[u8; 256]; 2],
    psg_last: u8,
    ticks: u64,
}

impl LatchingSynth {
    pub fn new() -> Self {
        Self {
            address: [0; 2],
            registers: [[0; 256]; 2],
            psg_last: 0,
            ticks: 0,
        }
    }

    /// Last value written to FM register `index` of `part` (0 or 1).
    pub fn register(&self, part: usize, index: u8) -> u8 {
        self.registers
            .get(part)
            .map(|regs| regs[index as usize])
            .unwrap_or(0)
    }

    pub fn last_psg_write(&self) -> u8 {
        self.psg_last
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for LatchingSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for LatchingSynth {
    fn write(&mut self, port: u8, value: u8) {
        let part = ((port >> 1) & 1) as usize;
        if port & 1 == 0 {
            self.address[part] = value;
        } else {
            self.registers[part][self.address[part] as usize] = value;
        }
    }

    fn read(&mut self, _port: u8) -> u8 {
        // Never busy, no timer overflow
        0x00
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn write_psg(&mut self, value: u8) {
        self.psg_last = value;
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
