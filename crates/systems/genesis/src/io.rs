//! I/O block at `$A10000`
//!
//! Sixteen byte registers on odd addresses: version, three data ports,
//! three control ports and the serial registers. Data port reads merge the
//! latched output bits with the pad lines selected by TH.

use emu_core::logging::{log, LogCategory, LogLevel};

pub const IO_REGISTERS: usize = 16;
pub const PAD_PORTS: usize = 3;

const POWER_ON: [u8; IO_REGISTERS] = [
    0xA0, 0x7F, 0x7F, 0x7F, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00,
];

/// Pad button bits as passed to [`IoPorts::set_pad_state`] (1 = pressed).
pub mod buttons {
    pub const UP: u8 = 0x01;
    pub const DOWN: u8 = 0x02;
    pub const LEFT: u8 = 0x04;
    pub const RIGHT: u8 = 0x08;
    pub const B: u8 = 0x10;
    pub const C: u8 = 0x20;
    pub const A: u8 = 0x40;
    pub const START: u8 = 0x80;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoPorts {
    regs: [u8; IO_REGISTERS],
    pads: [u8; PAD_PORTS],
}

impl IoPorts {
    pub fn new() -> Self {
        Self {
            regs: POWER_ON,
            pads: [0; PAD_PORTS],
        }
    }

    /// Restore power-on values, keeping the version byte.
    pub fn reset(&mut self) {
        let version = self.regs[0];
        self.regs = POWER_ON;
        self.regs[0] = version;
    }

    pub fn set_version(&mut self, version: u8) {
        self.regs[0] = version;
    }

    pub fn version(&self) -> u8 {
        self.regs[0]
    }

    pub fn set_pad_state(&mut self, port: usize, pressed: u8) {
        if let Some(pad) = self.pads.get_mut(port) {
            *pad = pressed;
        }
    }

    /// Byte read at an offset within `$A10000-$A1001F`.
    pub fn read(&self, offset: u32) -> u8 {
        let index = ((offset >> 1) & 0x0F) as usize;
        match index {
            1..=3 => {
                // Pins configured as outputs (plus bit 7) read back the latch
                let output_mask = 0x80 | self.regs[index + 3];
                (self.regs[index] & output_mask) | (self.pad_lines(index - 1) & !output_mask)
            }
            _ => self.regs[index],
        }
    }

    /// Byte write at an offset within `$A10000-$A1001F`.
    pub fn write(&mut self, offset: u32, value: u8) {
        let index = ((offset >> 1) & 0x0F) as usize;
        match index {
            0 => log(LogCategory::Bus, LogLevel::Debug, || {
                format!("IO: write {:02X} to version register ignored", value)
            }),
            _ => self.regs[index] = value,
        }
    }

    /// Pad lines for `port` given the current TH level. TH floats high
    /// when configured as an input.
    fn pad_lines(&self, port: usize) -> u8 {
        let data = self.regs[port + 1];
        let control = self.regs[port + 4];
        let th_high = control & 0x40 == 0 || data & 0x40 != 0;
        let pressed = self.pads[port];

        if th_high {
            // TH C B R L D U
            0x40 | (0x3F & !pressed)
        } else {
            // TH 0 S A 0 0 D U
            0x33 & !((pressed & 0x03) | ((pressed >> 2) & 0x30))
        }
    }
}

impl Default for IoPorts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_values() {
        let io = IoPorts::new();
        assert_eq!(io.read(0x01), 0xA0);
        assert_eq!(io.read(0x0F), 0xFF);
        assert_eq!(io.read(0x09), 0x00);
    }

    #[test]
    fn test_version_is_read_only() {
        let mut io = IoPorts::new();
        io.set_version(0xE0);
        io.write(0x01, 0x00);
        assert_eq!(io.read(0x01), 0xE0);
        io.reset();
        assert_eq!(io.version(), 0xE0);
    }

    #[test]
    fn test_pad_read_th_high() {
        let mut io = IoPorts::new();
        io.write(0x09, 0x40); // TH as output
        io.write(0x03, 0x40); // TH high
        io.set_pad_state(0, buttons::UP | buttons::C);
        assert_eq!(io.read(0x03), 0x40 | (0x3F & !(buttons::UP | buttons::C)));
    }

    #[test]
    fn test_pad_read_th_low_reports_start_and_a() {
        let mut io = IoPorts::new();
        io.write(0x09, 0x40);
        io.write(0x03, 0x00);
        io.set_pad_state(0, buttons::START | buttons::A | buttons::DOWN);
        // S, A and D pulled low, bits 2-3 always low
        assert_eq!(io.read(0x03), 0x01);
    }

    #[test]
    fn test_unconnected_pad_reads_idle() {
        let io = IoPorts::new();
        assert_eq!(io.read(0x05) & 0x3F, 0x3F);
    }
}
