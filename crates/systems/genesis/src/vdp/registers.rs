//! VDP register file and register-derived fields

use super::Vdp;
use emu_core::logging::{log, LogCategory, LogLevel};

/// Size of the register array as addressed by the control port.
pub const REGISTER_SLOTS: usize = 0x20;
/// Registers past this index do not exist and ignore writes.
pub const IMPLEMENTED_REGISTERS: usize = 24;
/// Without mode 5 only the SMS-compatible registers are writable.
const MODE4_LAST_REGISTER: usize = 0x0A;

/// Horizontal scroll table addressing (register 11, bits 0-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HScrollMode {
    /// One scroll value for the whole screen
    Full,
    /// Rows repeat the first eight table entries
    FirstEightLines,
    /// One scroll value per 8-line cell row
    PerCell,
    /// One scroll value per line
    PerLine,
}

impl HScrollMode {
    /// Mask applied to the line number before indexing the table.
    pub fn line_mask(self) -> u16 {
        match self {
            HScrollMode::Full => 0x0000,
            HScrollMode::FirstEightLines => 0x0007,
            HScrollMode::PerCell => 0xFFF8,
            HScrollMode::PerLine => 0xFFFF,
        }
    }
}

/// Vertical scroll addressing (register 11, bit 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VScrollMode {
    Full,
    /// One VSRAM pair per 16-pixel column
    TwoCell,
}

/// DMA transfer type (register 23, bits 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaMode {
    MemoryToVdp,
    Fill,
    Copy,
}

/// The 32 byte-wide VDP registers with accessors for each bitfield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdpRegisters {
    regs: [u8; REGISTER_SLOTS],
}

impl VdpRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; REGISTER_SLOTS],
        }
    }

    pub fn get(&self, index: usize) -> u8 {
        self.regs.get(index).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.regs
    }

    pub(super) fn set_raw(&mut self, index: usize, value: u8) {
        if let Some(slot) = self.regs.get_mut(index) {
            *slot = value;
        }
    }

    pub fn clear(&mut self) {
        self.regs.fill(0);
    }

    fn bit(&self, index: usize, bit: u8) -> bool {
        (self.regs[index] >> bit) & 1 != 0
    }

    // Register 0
    pub fn hv_latch_enabled(&self) -> bool {
        self.bit(0, 1)
    }

    pub fn line_interrupt_enabled(&self) -> bool {
        self.bit(0, 4)
    }

    // Register 1
    pub fn mode5(&self) -> bool {
        self.bit(1, 2)
    }

    pub fn v30(&self) -> bool {
        self.bit(1, 3)
    }

    pub fn dma_enabled(&self) -> bool {
        self.bit(1, 4)
    }

    pub fn frame_interrupt_enabled(&self) -> bool {
        self.bit(1, 5)
    }

    pub fn display_enabled(&self) -> bool {
        self.bit(1, 6)
    }

    pub fn plane_a_base(&self) -> u16 {
        ((self.regs[2] & 0x38) as u16) << 10
    }

    /// Window nametable; H40 ignores bit 1 of the base.
    pub fn window_base(&self) -> u16 {
        let mask = if self.h40() { 0x3C } else { 0x3E };
        ((self.regs[3] & mask) as u16) << 10
    }

    pub fn plane_b_base(&self) -> u16 {
        ((self.regs[4] & 0x07) as u16) << 13
    }

    pub fn sprite_table_base(&self) -> u16 {
        let mask = if self.h40() { 0x7E } else { 0x7F };
        ((self.regs[5] & mask) as u16) << 9
    }

    pub fn sprite_table_size(&self) -> usize {
        if self.h40() {
            0x400
        } else {
            0x200
        }
    }

    pub fn max_sprites(&self) -> usize {
        if self.h40() {
            80
        } else {
            64
        }
    }

    pub fn backdrop_index(&self) -> usize {
        (self.regs[7] & 0x3F) as usize
    }

    pub fn line_counter_reload(&self) -> u8 {
        self.regs[10]
    }

    pub fn hscroll_mode(&self) -> HScrollMode {
        match self.regs[11] & 0x03 {
            0 => HScrollMode::Full,
            1 => HScrollMode::FirstEightLines,
            2 => HScrollMode::PerCell,
            _ => HScrollMode::PerLine,
        }
    }

    pub fn vscroll_mode(&self) -> VScrollMode {
        if self.bit(11, 2) {
            VScrollMode::TwoCell
        } else {
            VScrollMode::Full
        }
    }

    /// 40-cell mode when either RS0 (bit 7) or RS1 (bit 0) is set.
    pub fn h40(&self) -> bool {
        self.regs[12] & 0x81 != 0
    }

    pub fn hscroll_base(&self) -> u16 {
        ((self.regs[13] & 0x3F) as u16) << 10
    }

    pub fn auto_increment(&self) -> u16 {
        self.regs[15] as u16
    }

    /// Plane size in cells (width, height) from register 16.
    pub fn plane_size(&self) -> (u16, u16) {
        let h = self.regs[16] & 0x03;
        let v = (self.regs[16] >> 4) & 0x03;
        match (v, h) {
            (_, 2) => (64, 1),
            (0, 0) => (32, 32),
            (0, 1) => (64, 32),
            (0, 3) => (128, 32),
            (1, 0) | (2, 0) => (32, 64),
            (1, 1) | (2, 1) | (3, 1) => (64, 64),
            (1, 3) => (128, 32),
            (2, 3) => (128, 64),
            (3, 0) => (32, 128),
            _ => (128, 128),
        }
    }

    /// Window split column in pixels and whether the window is on the right.
    pub fn window_horizontal(&self) -> (u16, bool) {
        (((self.regs[17] & 0x1F) as u16) * 16, self.bit(17, 7))
    }

    /// Window split line in pixels and whether the window is at the bottom.
    pub fn window_vertical(&self) -> (u16, bool) {
        (((self.regs[18] & 0x1F) as u16) * 8, self.bit(18, 7))
    }

    pub fn dma_length(&self) -> u16 {
        u16::from_le_bytes([self.regs[19], self.regs[20]])
    }

    pub fn dma_source_low(&self) -> u16 {
        u16::from_le_bytes([self.regs[21], self.regs[22]])
    }

    pub fn dma_source_high(&self) -> u8 {
        self.regs[23] & 0x7F
    }

    pub fn dma_mode(&self) -> DmaMode {
        match self.regs[23] >> 6 {
            0 | 1 => DmaMode::MemoryToVdp,
            2 => DmaMode::Fill,
            _ => DmaMode::Copy,
        }
    }

    pub fn screen_width(&self) -> u16 {
        if self.h40() {
            320
        } else {
            256
        }
    }

    pub fn screen_height(&self) -> u16 {
        if self.v30() {
            240
        } else {
            224
        }
    }

    /// Write back the DMA source and clear the length after a transfer.
    pub(super) fn finish_dma(&mut self, source_low: u16) {
        let [lo, hi] = source_low.to_le_bytes();
        self.regs[19] = 0;
        self.regs[20] = 0;
        self.regs[21] = lo;
        self.regs[22] = hi;
    }
}

impl Default for VdpRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl Vdp {
    /// Register write with its side effects.
    ///
    /// Any accepted write drops the first half of an in-flight command
    /// (code bits 0-1 and address bits 0-13). Register 0 bit 1 latches or
    /// releases the H/V counter.
    pub fn set_register(&mut self, index: usize, value: u8) {
        if index >= IMPLEMENTED_REGISTERS {
            log(LogCategory::Vdp, LogLevel::Debug, || {
                format!("VDP: write to nonexistent register {:02X}", index)
            });
            return;
        }
        if !self.regs.mode5() && index > MODE4_LAST_REGISTER {
            log(LogCategory::Vdp, LogLevel::Debug, || {
                format!("VDP: register {:02X} blocked outside mode 5", index)
            });
            return;
        }

        self.regs.set_raw(index, value);
        self.control.code &= !0x03;
        self.control.address &= !0x3FFF;

        if index == 0 {
            let enabled = self.regs.hv_latch_enabled();
            match (enabled, self.hv_latch) {
                (true, None) => self.hv_latch = Some(self.live_hv_counter()),
                (false, Some(_)) => self.hv_latch = None,
                _ => {}
            }
        }

        log(LogCategory::Vdp, LogLevel::Trace, || {
            format!("VDP: R{:02} <- {:02X}", index, value)
        });
    }

    pub fn registers(&self) -> &VdpRegisters {
        &self.regs
    }
}
