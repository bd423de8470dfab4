//! Genesis memory bus
//!
//! Owns every memory and device the two CPUs can reach and routes byte,
//! word and long accesses through [`address::classify`]. The 68000 sees
//! the full 24-bit map; the Z80 sees the 64 KiB sound window, including a
//! banked view back into 68000 space.

use crate::address::{self, BusRegion, ADDRESS_MASK};
use crate::io::IoPorts;
use crate::sound::{LatchingSynth, SoundCpuControl, Synthesizer};
use crate::vdp::{DmaSource, Vdp, VdpPort};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::renderer::Renderer;

/// Largest cartridge image the ROM window can hold.
pub const MAX_ROM_SIZE: usize = 0x40_0000;
pub const WORK_RAM_SIZE: usize = 0x1_0000;
pub const SOUND_RAM_SIZE: usize = 0x8000;

const Z80_BANK_REGISTER: std::ops::RangeInclusive<u16> = 0x6000..=0x60FF;

/// ROM and work RAM as seen by the DMA engine.
///
/// Borrowed from disjoint bus fields so the VDP can be mutated while the
/// transfer reads memory.
struct DmaView<'a> {
    rom: &'a [u8],
    work_ram: &'a [u8],
}

impl DmaSource for DmaView<'_> {
    fn read_dma_word(&self, address: u32) -> u16 {
        let address = address & ADDRESS_MASK & !1;
        match address::classify(address) {
            BusRegion::Rom | BusRegion::RomMirror => {
                let offset = (address as usize) % MAX_ROM_SIZE;
                u16::from_be_bytes([rom_byte(self.rom, offset), rom_byte(self.rom, offset + 1)])
            }
            BusRegion::WorkRam => {
                let offset = (address & 0xFFFF) as usize;
                u16::from_be_bytes([self.work_ram[offset], self.work_ram[offset | 1]])
            }
            region => {
                log(LogCategory::Dma, LogLevel::Warn, || {
                    format!("DMA: source {:06X} in {:?} not readable", address, region)
                });
                0xFFFF
            }
        }
    }
}

/// Bytes past the end of the image read as zero.
fn rom_byte(rom: &[u8], offset: usize) -> u8 {
    rom.get(offset).copied().unwrap_or(0)
}

pub struct MemoryBus {
    rom: Vec<u8>,
    work_ram: Vec<u8>,
    sound_ram: Vec<u8>,
    tmss: [u8; 4],

    pub vdp: Vdp,
    pub io: IoPorts,
    pub sound_control: SoundCpuControl,
    synth: Box<dyn Synthesizer>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_synth(Box::new(LatchingSynth::new()))
    }

    pub fn with_synth(synth: Box<dyn Synthesizer>) -> Self {
        Self {
            rom: Vec::new(),
            work_ram: vec![0; WORK_RAM_SIZE],
            sound_ram: vec![0; SOUND_RAM_SIZE],
            tmss: [0; 4],
            vdp: Vdp::new(),
            io: IoPorts::new(),
            sound_control: SoundCpuControl::new(),
            synth,
        }
    }

    /// Replace the cartridge image. The caller validates the size.
    pub fn load_rom(&mut self, data: &[u8]) {
        self.rom = data.to_vec();
    }

    pub fn unload_rom(&mut self) {
        self.rom.clear();
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn work_ram(&self) -> &[u8] {
        &self.work_ram
    }

    pub fn sound_ram(&self) -> &[u8] {
        &self.sound_ram
    }

    pub fn tmss(&self) -> [u8; 4] {
        self.tmss
    }

    pub fn synth_mut(&mut self) -> &mut dyn Synthesizer {
        self.synth.as_mut()
    }

    /// Zero RAM and return every device to its power-on state. The
    /// cartridge stays loaded.
    pub fn reset(&mut self) {
        self.work_ram.fill(0);
        self.sound_ram.fill(0);
        self.tmss = [0; 4];
        self.vdp.reset();
        self.io.reset();
        self.sound_control = SoundCpuControl::new();
        self.synth.reset();
    }

    pub fn tick_synth(&mut self) {
        self.synth.tick();
    }

    // 68000 side

    pub fn read8(&mut self, address: u32) -> u8 {
        let address = address & ADDRESS_MASK;
        match address::classify(address) {
            BusRegion::Rom => rom_byte(&self.rom, address as usize),
            BusRegion::RomMirror => rom_byte(&self.rom, address as usize % MAX_ROM_SIZE),
            BusRegion::SoundRam => self.sound_ram[(address & 0x7FFF) as usize],
            BusRegion::Synth => self.synth.read((address & 0x03) as u8),
            BusRegion::SoundVdp | BusRegion::Vdp => self.vdp_read8(address),
            BusRegion::SoundRomView => self.banked_read8(address as u16),
            BusRegion::IoPorts => self.io.read(address),
            BusRegion::SoundCpuControl => self.sound_control.read(address as u16),
            BusRegion::Tmss => self.tmss[(address & 0x03) as usize],
            BusRegion::WorkRam => self.work_ram[(address & 0xFFFF) as usize],
            BusRegion::Unmapped => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("BUS: unmapped byte read {:06X}", address)
                });
                0xFF
            }
        }
    }

    pub fn read16(&mut self, address: u32) -> u16 {
        let address = address & ADDRESS_MASK & !1;
        match address::classify(address) {
            BusRegion::SoundVdp | BusRegion::Vdp => self.vdp_read16(address),
            // The sound side is 8 bits wide; the byte appears on both halves
            BusRegion::SoundRam | BusRegion::Synth => {
                let value = self.read8(address);
                u16::from_be_bytes([value, value])
            }
            BusRegion::Unmapped => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("BUS: unmapped word read {:06X}", address)
                });
                0xFFFF
            }
            _ => u16::from_be_bytes([self.read8(address), self.read8(address + 1)]),
        }
    }

    pub fn read32(&mut self, address: u32) -> u32 {
        let high = self.read16(address) as u32;
        let low = self.read16(address.wrapping_add(2)) as u32;
        (high << 16) | low
    }

    pub fn write8(&mut self, address: u32, value: u8) {
        let address = address & ADDRESS_MASK;
        match address::classify(address) {
            BusRegion::Rom | BusRegion::RomMirror => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("BUS: write {:02X} to ROM {:06X} ignored", value, address)
                });
            }
            BusRegion::SoundRam => self.sound_ram[(address & 0x7FFF) as usize] = value,
            BusRegion::Synth => self.synth.write((address & 0x03) as u8, value),
            BusRegion::SoundVdp | BusRegion::Vdp => self.vdp_write8(address, value),
            BusRegion::SoundRomView => self.banked_write8(address as u16, value),
            BusRegion::IoPorts => self.io.write(address, value),
            BusRegion::SoundCpuControl => self.sound_control.write(address as u16, value),
            BusRegion::Tmss => self.tmss[(address & 0x03) as usize] = value,
            BusRegion::WorkRam => self.work_ram[(address & 0xFFFF) as usize] = value,
            BusRegion::Unmapped => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("BUS: unmapped byte write {:02X} to {:06X}", value, address)
                });
            }
        }
    }

    pub fn write16(&mut self, address: u32, value: u16) {
        let address = address & ADDRESS_MASK & !1;
        let [hi, lo] = value.to_be_bytes();
        match address::classify(address) {
            BusRegion::SoundVdp | BusRegion::Vdp => self.vdp_write16(address, value),
            // Only the high byte reaches the 8-bit sound side
            BusRegion::SoundRam | BusRegion::Synth => self.write8(address, hi),
            _ => {
                self.write8(address, hi);
                self.write8(address + 1, lo);
            }
        }
    }

    pub fn write32(&mut self, address: u32, value: u32) {
        self.write16(address, (value >> 16) as u16);
        self.write16(address.wrapping_add(2), value as u16);
    }

    // VDP window

    fn vdp_read16(&mut self, address: u32) -> u16 {
        match VdpPort::decode(address) {
            VdpPort::Data => self.vdp.read_data(),
            VdpPort::Control => self.vdp.read_status(),
            VdpPort::HvCounter => self.vdp.read_hv_counter(),
            port => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("VDP: read from {:?} port {:06X}", port, address)
                });
                0xFFFF
            }
        }
    }

    fn vdp_read8(&mut self, address: u32) -> u8 {
        let [hi, lo] = self.vdp_read16(address & !1).to_be_bytes();
        if address & 1 == 0 {
            hi
        } else {
            lo
        }
    }

    fn vdp_write16(&mut self, address: u32, value: u16) {
        match VdpPort::decode(address) {
            VdpPort::Data => self.vdp.write_data(value),
            VdpPort::Control => {
                let source = DmaView {
                    rom: &self.rom,
                    work_ram: &self.work_ram,
                };
                self.vdp.write_control(value, &source);
            }
            VdpPort::Psg => self.synth.write_psg(value as u8),
            port => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("VDP: write {:04X} to {:?} port {:06X}", value, port, address)
                });
            }
        }
    }

    /// Byte writes reach the VDP as a word with the byte on both halves,
    /// except odd PSG offsets which go to the PSG.
    fn vdp_write8(&mut self, address: u32, value: u8) {
        if VdpPort::decode(address) == VdpPort::Psg && address & 1 == 1 {
            self.synth.write_psg(value);
            return;
        }
        self.vdp_write16(address & !1, u16::from_be_bytes([value, value]));
    }

    // Banked ROM view

    /// 68000 address behind an offset in the `$8000-$FFFF` window.
    fn banked_address(&self, offset: u16) -> u32 {
        self.sound_control.bank_base() | (offset & 0x7FFF) as u32
    }

    fn banked_read8(&mut self, offset: u16) -> u8 {
        let target = self.banked_address(offset);
        if (target >> 16) == 0xA0 {
            log(LogCategory::Sound, LogLevel::Debug, || {
                format!("Z80: bank read of sound window {:06X}", target)
            });
            return 0xFF;
        }
        self.read8(target)
    }

    fn banked_write8(&mut self, offset: u16, value: u8) {
        let target = self.banked_address(offset);
        if (target >> 16) == 0xA0 {
            log(LogCategory::Sound, LogLevel::Debug, || {
                format!("Z80: bank write to sound window {:06X}", target)
            });
            return;
        }
        self.write8(target, value);
    }

    // Z80 side

    pub fn z80_read8(&mut self, address: u16) -> u8 {
        match address::classify_sound_window(address) {
            BusRegion::Synth => self.synth.read((address & 0x03) as u8),
            BusRegion::SoundVdp => self.vdp_read8(address as u32 & 0x1F),
            BusRegion::SoundRomView => self.banked_read8(address),
            _ => self.sound_ram[(address & 0x7FFF) as usize],
        }
    }

    pub fn z80_write8(&mut self, address: u16, value: u8) {
        if Z80_BANK_REGISTER.contains(&address) {
            self.sound_control.shift_bank_bit(value);
            return;
        }
        match address::classify_sound_window(address) {
            BusRegion::Synth => self.synth.write((address & 0x03) as u8, value),
            BusRegion::SoundVdp => self.vdp_write8(address as u32 & 0x1F, value),
            BusRegion::SoundRomView => self.banked_write8(address, value),
            _ => self.sound_ram[(address & 0x7FFF) as usize] = value,
        }
    }

    /// Small serializable summary for the diagnostics snapshot.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "rom_size": self.rom.len(),
            "sound_control": self.sound_control,
            "version": self.io.version(),
            "tmss": self.tmss,
            "vdp": self.vdp.snapshot(),
        })
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}
