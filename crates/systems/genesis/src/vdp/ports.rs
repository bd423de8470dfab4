//! VDP port protocol
//!
//! The control port accepts either a register write (`10rr rrrr vvvv vvvv`)
//! or a two-word command that sets the 6-bit access code and the 16-bit
//! address:
//!
//! ```text
//! first word:  CD1 CD0 A13 ... A0
//! second word: 0 0 0 0 0 0 0 0 CD5 CD4 CD3 CD2 0 0 A15 A14
//! ```
//!
//! Code bit 5 starts a DMA. The low four bits pick the memory and
//! direction used by data port accesses.

use super::{DmaSource, Vdp, STATUS_FIFO_EMPTY, STATUS_FIXED_BITS, STATUS_PAL};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::Serialize;

/// Code bit that requests a DMA transfer.
pub const CODE_DMA: u8 = 0x20;
const FIFO_TEST_CODE: u8 = 0x09;
const VSRAM_VISIBLE: usize = 0x28;

/// Decoded low nibble of the access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    VramRead,
    VramWrite,
    CramWrite,
    VsramRead,
    VsramWrite,
    CramRead,
    Vram8Read,
    Invalid(u8),
}

impl AccessTarget {
    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0x0 => AccessTarget::VramRead,
            0x1 => AccessTarget::VramWrite,
            0x3 => AccessTarget::CramWrite,
            0x4 => AccessTarget::VsramRead,
            0x5 => AccessTarget::VsramWrite,
            0x8 => AccessTarget::CramRead,
            0xC => AccessTarget::Vram8Read,
            other => AccessTarget::Invalid(other),
        }
    }

    pub fn is_read(self) -> bool {
        matches!(
            self,
            AccessTarget::VramRead
                | AccessTarget::VsramRead
                | AccessTarget::CramRead
                | AccessTarget::Vram8Read
        )
    }
}

/// Which VDP port an offset within the 32-byte window selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdpPort {
    Data,
    Control,
    HvCounter,
    Psg,
    FifoTest,
    Debug,
    Unused,
}

impl VdpPort {
    pub fn decode(offset: u32) -> Self {
        match offset & 0x1F {
            0x00..=0x03 => VdpPort::Data,
            0x04..=0x07 => VdpPort::Control,
            0x08..=0x0F => VdpPort::HvCounter,
            0x10..=0x17 => VdpPort::Psg,
            0x18..=0x19 => VdpPort::FifoTest,
            0x1C..=0x1D => VdpPort::Debug,
            _ => VdpPort::Unused,
        }
    }
}

/// Command state left by control port writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlLatch {
    pub code: u8,
    pub address: u16,
    /// Set after the first word of a two-word command
    pub pending: bool,
}

impl ControlLatch {
    pub fn target(&self) -> AccessTarget {
        AccessTarget::from_code(self.code)
    }
}

/// Four-entry write FIFO. Index 0 is the newest entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFifo {
    entries: [u16; 4],
}

impl WriteFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u16) {
        self.entries.rotate_right(1);
        self.entries[0] = value;
    }

    pub fn newest(&self) -> u16 {
        self.entries[0]
    }

    pub fn oldest(&self) -> u16 {
        self.entries[3]
    }

    pub fn entries(&self) -> [u16; 4] {
        self.entries
    }
}

pub(crate) fn cram_index(address: u16) -> usize {
    ((address & 0x7F) >> 1) as usize
}

impl Vdp {
    /// Write a word to the control port.
    pub fn write_control(&mut self, value: u16, source: &dyn DmaSource) {
        if !self.control.pending {
            if value & 0xC000 == 0x8000 {
                let [index, data] = value.to_be_bytes();
                self.set_register((index & 0x1F) as usize, data);
                return;
            }
            self.control.code = (self.control.code & 0x3C) | ((value >> 14) as u8 & 0x03);
            self.control.address = (self.control.address & 0xC000) | (value & 0x3FFF);
            self.control.pending = true;
            return;
        }

        self.control.code = (self.control.code & 0x03) | ((value >> 2) as u8 & 0x3C);
        self.control.address = (self.control.address & 0x3FFF) | ((value & 0x03) << 14);
        self.control.pending = false;

        log(LogCategory::Vdp, LogLevel::Trace, || {
            format!(
                "VDP: command code={:02X} address={:04X}",
                self.control.code, self.control.address
            )
        });

        if self.control.code & CODE_DMA != 0 {
            self.trigger_dma(source);
        }
    }

    /// Write a word to the data port.
    pub fn write_data(&mut self, value: u16) {
        self.control.pending = false;
        self.fifo.push(value);

        let address = self.control.address;
        let written = match self.control.target() {
            AccessTarget::VramWrite => {
                let [hi, lo] = value.to_be_bytes();
                self.vram_write(address, hi);
                self.vram_write(address ^ 1, lo);
                true
            }
            AccessTarget::CramWrite => {
                self.cram[cram_index(address)] = value;
                true
            }
            AccessTarget::VsramWrite => {
                self.vsram[cram_index(address)] = value;
                true
            }
            target if target.is_read() => false,
            AccessTarget::Invalid(FIFO_TEST_CODE) => false,
            AccessTarget::Invalid(code) => {
                log(LogCategory::Vdp, LogLevel::Warn, || {
                    format!("VDP: data write with invalid code {:X}", code)
                });
                false
            }
            _ => false,
        };
        if written {
            self.advance_address();
        }

        // An armed fill is consumed by the next data write whatever the code
        if self.fill_pending {
            self.run_fill(value);
        }
    }

    /// Read a word from the data port using the current read code.
    pub fn read_data(&mut self) -> u16 {
        self.control.pending = false;

        let address = self.control.address;
        let fifo = self.fifo.oldest();
        let value = match self.control.target() {
            AccessTarget::VramRead => self.vram_word(address),
            AccessTarget::VsramRead => {
                let index = cram_index(address);
                let word = if index >= VSRAM_VISIBLE {
                    self.vsram[0]
                } else {
                    self.vsram[index]
                };
                (word & 0x07FF) | (fifo & !0x07FF)
            }
            AccessTarget::CramRead => (self.cram[cram_index(address)] & 0x0EEE) | (fifo & !0x0EEE),
            AccessTarget::Vram8Read => {
                (self.vram[(address ^ 1) as usize] as u16) | (fifo & 0xFF00)
            }
            target => {
                log(LogCategory::Vdp, LogLevel::Debug, || {
                    format!("VDP: data read with write code {:?}", target)
                });
                return fifo;
            }
        };
        self.advance_address();
        value
    }

    /// Read the status register. Clears the command latch.
    pub fn read_status(&mut self) -> u16 {
        self.control.pending = false;
        self.peek_status()
    }

    /// Status register value without side effects.
    pub fn peek_status(&self) -> u16 {
        let pal = if self.pal { STATUS_PAL } else { 0 };
        self.status | STATUS_FIXED_BITS | STATUS_FIFO_EMPTY | pal
    }

    /// Latched H/V counter if the latch is armed, otherwise the live value.
    pub fn read_hv_counter(&self) -> u16 {
        self.hv_latch.unwrap_or_else(|| self.live_hv_counter())
    }

    /// H/V counter derived from the beam position.
    pub fn live_hv_counter(&self) -> u16 {
        let h = self.hcounter();
        let v = self.vcounter();
        ((v & 0xFF) << 8) | (h >> 1)
    }

    fn hcounter(&self) -> u16 {
        let mclk = self.beam.mclk;
        let (pixels, offset, jump_at, jump_to) = if self.regs.h40() {
            (420, 0x0D, 0x16D, 0x1C9)
        } else {
            (342, 0x0B, 0x128, 0x1D2)
        };
        let mut h = mclk * pixels / 3420 + offset;
        if h >= jump_at {
            h += jump_to - jump_at;
        }
        (h & 0x1FF) as u16
    }

    fn vcounter(&self) -> u16 {
        let threshold = if self.regs.v30() { 262 } else { 234 };
        let line = self.beam.line as i32;
        let v = if line > threshold {
            line - self.lines_per_frame as i32
        } else {
            line
        };
        (v & 0x1FF) as u16
    }

    pub(crate) fn advance_address(&mut self) {
        self.control.address = self
            .control
            .address
            .wrapping_add(self.regs.auto_increment());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoMemory;

    impl DmaSource for NoMemory {
        fn read_dma_word(&self, _address: u32) -> u16 {
            0
        }
    }

    fn mode5_vdp() -> Vdp {
        let mut vdp = Vdp::new();
        vdp.write_control(0x8104, &NoMemory);
        vdp.write_control(0x8F02, &NoMemory);
        vdp
    }

    fn set_command(vdp: &mut Vdp, code: u8, address: u16) {
        let code = code as u16;
        vdp.write_control(((code & 0x03) << 14) | (address & 0x3FFF), &NoMemory);
        vdp.write_control(((code & 0x3C) << 2) | (address >> 14), &NoMemory);
    }

    #[test]
    fn test_register_write_through_control_port() {
        let mut vdp = Vdp::new();
        vdp.write_control(0x8030, &NoMemory);
        assert_eq!(vdp.registers().get(0), 0x30);
        assert!(!vdp.control().pending);

        // Not a register write: starts a two-word command instead
        vdp.write_control(0x00FF, &NoMemory);
        assert!(vdp.control().pending);
        assert_eq!(vdp.control().address, 0x00FF);
        assert_eq!(vdp.control().code, 0x00);
    }

    #[test]
    fn test_extended_registers_blocked_outside_mode5() {
        let mut vdp = Vdp::new();
        vdp.write_control(0x90FF, &NoMemory);
        assert_eq!(vdp.registers().get(0x10), 0);

        vdp.write_control(0x8104, &NoMemory);
        vdp.write_control(0x90FF, &NoMemory);
        assert_eq!(vdp.registers().get(0x10), 0xFF);

        // Registers 24-31 do not exist
        vdp.write_control(0x98AA, &NoMemory);
        assert_eq!(vdp.registers().get(0x18), 0);
    }

    #[test]
    fn test_register_write_clears_partial_command() {
        let mut vdp = mode5_vdp();
        set_command(&mut vdp, 0x01, 0xC123);
        vdp.write_control(0x8F02, &NoMemory);
        assert_eq!(vdp.control().code, 0x00);
        assert_eq!(vdp.control().address, 0xC000);
    }

    #[test]
    fn test_two_word_command_assembles_code_and_address() {
        let mut vdp = mode5_vdp();
        // CRAM write at $0000: code 3
        vdp.write_control(0xC000, &NoMemory);
        vdp.write_control(0x0000, &NoMemory);
        assert_eq!(vdp.control().code, 0x03);
        assert_eq!(vdp.control().address, 0x0000);

        // VSRAM write at $0010: code 5
        vdp.write_control(0x4010, &NoMemory);
        vdp.write_control(0x0010, &NoMemory);
        assert_eq!(vdp.control().code, 0x05);
        assert_eq!(vdp.control().address, 0x0010);

        // VRAM write at $C000
        vdp.write_control(0x4000, &NoMemory);
        vdp.write_control(0x0003, &NoMemory);
        assert_eq!(vdp.control().code, 0x01);
        assert_eq!(vdp.control().address, 0xC000);
    }

    #[test]
    fn test_vram_write_and_read_back() {
        let mut vdp = mode5_vdp();
        set_command(&mut vdp, 0x01, 0x1000);
        vdp.write_data(0xABCD);
        vdp.write_data(0x1234);
        assert_eq!(vdp.vram()[0x1000], 0xAB);
        assert_eq!(vdp.vram()[0x1001], 0xCD);
        assert_eq!(vdp.control().address, 0x1004);

        set_command(&mut vdp, 0x00, 0x1000);
        assert_eq!(vdp.read_data(), 0xABCD);
        assert_eq!(vdp.read_data(), 0x1234);
    }

    #[test]
    fn test_cram_and_vsram_writes() {
        let mut vdp = mode5_vdp();
        set_command(&mut vdp, 0x03, 0x000A);
        vdp.write_data(0x0E00);
        assert_eq!(vdp.cram()[5], 0x0E00);

        set_command(&mut vdp, 0x05, 0x0002);
        vdp.write_data(0x0155);
        assert_eq!(vdp.vsram()[1], 0x0155);

        set_command(&mut vdp, 0x08, 0x000A);
        assert_eq!(vdp.read_data() & 0x0EEE, 0x0E00);
    }

    /// Push words through the FIFO without touching VDP memory.
    fn prime_fifo(vdp: &mut Vdp, words: &[u16]) {
        set_command(vdp, 0x00, 0x0000);
        for &word in words {
            vdp.write_data(word);
        }
    }

    #[test]
    fn test_cram_read_carries_stale_fifo_bits() {
        let mut vdp = mode5_vdp();
        prime_fifo(&mut vdp, &[0xF111, 0xF222, 0xF333]);
        set_command(&mut vdp, 0x03, 0x000A);
        vdp.write_data(0x0E00);
        assert_eq!(vdp.fifo().entries(), [0x0E00, 0xF333, 0xF222, 0xF111]);

        set_command(&mut vdp, 0x08, 0x000A);
        assert_eq!(vdp.read_data(), 0xFF11);
    }

    #[test]
    fn test_vsram_read_carries_stale_fifo_bits() {
        let mut vdp = mode5_vdp();
        prime_fifo(&mut vdp, &[0xA5A5, 0x0000, 0x0000]);
        set_command(&mut vdp, 0x05, 0x0002);
        vdp.write_data(0x0321);

        set_command(&mut vdp, 0x04, 0x0002);
        assert_eq!(vdp.read_data(), 0xA321);
    }

    #[test]
    fn test_vram_byte_read() {
        let mut vdp = mode5_vdp();
        prime_fifo(&mut vdp, &[0x12FF, 0x0000, 0x0000]);
        set_command(&mut vdp, 0x01, 0x1000);
        vdp.write_data(0xABCD);

        set_command(&mut vdp, 0x0C, 0x1000);
        assert_eq!(vdp.control().target(), AccessTarget::Vram8Read);
        assert_eq!(vdp.read_data(), 0x12CD);
        assert_eq!(vdp.control().address, 0x1002);
        assert_eq!(vdp.read_data(), 0x1200);
    }

    #[test]
    fn test_fill_armed_under_read_code_is_consumed_by_next_write() {
        let mut vdp = Vdp::new();
        vdp.set_register(1, 0x14);
        vdp.set_register(15, 1);
        vdp.set_register(19, 4);
        vdp.set_register(23, 0x80);

        set_command(&mut vdp, 0x20, 0x0100);
        assert!(vdp.fill_pending());
        vdp.write_data(0x1111);
        assert!(!vdp.fill_pending());
        assert_eq!(vdp.registers().dma_length(), 0);
        assert!(vdp.vram().iter().all(|&b| b == 0));

        // A later unrelated write stays a plain two-byte write
        set_command(&mut vdp, 0x01, 0x2000);
        vdp.write_data(0x7777);
        assert_eq!(&vdp.vram()[0x2000..0x2008], &[0x77, 0x77, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_vsram_read_past_visible_entries_returns_first() {
        let mut vdp = mode5_vdp();
        set_command(&mut vdp, 0x05, 0x0000);
        vdp.write_data(0x0321);
        set_command(&mut vdp, 0x04, 0x0050);
        assert_eq!(vdp.read_data() & 0x07FF, 0x0321);
    }

    #[test]
    fn test_writes_with_read_code_are_ignored() {
        let mut vdp = mode5_vdp();
        set_command(&mut vdp, 0x00, 0x0100);
        vdp.write_data(0xFFFF);
        assert_eq!(vdp.vram()[0x0100], 0);
        assert_eq!(vdp.control().address, 0x0100);
        assert_eq!(vdp.fifo().newest(), 0xFFFF);
    }

    #[test]
    fn test_fifo_order() {
        let mut fifo = WriteFifo::new();
        for value in 1..=5 {
            fifo.push(value);
        }
        assert_eq!(fifo.entries(), [5, 4, 3, 2]);
        assert_eq!(fifo.oldest(), 2);
    }

    #[test]
    fn test_status_read_clears_pending() {
        let mut vdp = Vdp::new();
        vdp.write_control(0x4000, &NoMemory);
        assert!(vdp.control().pending);
        let status = vdp.read_status();
        assert!(!vdp.control().pending);
        assert_eq!(status & 0x3600, 0x3600);
    }

    #[test]
    fn test_hv_counter_follows_beam() {
        let mut vdp = Vdp::new();
        vdp.set_beam(0, 0);
        assert_eq!(vdp.read_hv_counter(), 0x0B >> 1);

        vdp.set_beam(100, 0);
        assert_eq!(vdp.read_hv_counter() >> 8, 100);

        // Past the active area the counter wraps back
        vdp.set_beam(240, 0);
        assert_eq!(vdp.read_hv_counter() >> 8, 0xEA);
    }

    #[test]
    fn test_hv_latch_freezes_counter() {
        let mut vdp = Vdp::new();
        vdp.set_beam(10, 0);
        vdp.set_register(0, 0x02);
        let latched = vdp.read_hv_counter();

        vdp.set_beam(20, 1000);
        assert_eq!(vdp.read_hv_counter(), latched);

        vdp.set_register(0, 0x00);
        assert_ne!(vdp.read_hv_counter(), latched);
        assert_eq!(vdp.read_hv_counter(), vdp.live_hv_counter());
    }

    #[test]
    fn test_port_decode() {
        assert_eq!(VdpPort::decode(0x00), VdpPort::Data);
        assert_eq!(VdpPort::decode(0x06), VdpPort::Control);
        assert_eq!(VdpPort::decode(0x08), VdpPort::HvCounter);
        assert_eq!(VdpPort::decode(0x11), VdpPort::Psg);
        assert_eq!(VdpPort::decode(0x1C), VdpPort::Debug);
        assert_eq!(VdpPort::decode(0x1E), VdpPort::Unused);
        assert_eq!(VdpPort::decode(0x20), VdpPort::Data);
    }
}
