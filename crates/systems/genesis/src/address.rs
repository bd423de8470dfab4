//! 68000 address decoder
//!
//! Maps a 24-bit bus address to the device that answers it.
//!
//! ```text
//! $000000-$3FFFFF  Cartridge ROM
//! $400000-$9FFFFF  ROM mirror (address modulo 4 MiB)
//! $A00000-$A0FFFF  Sound CPU window
//!     $0000-$3FFF  sound RAM
//!     $4000-$5FFF  YM2612 ports
//!     $6000-$7EFF  sound RAM
//!     $7F00-$7F1F  VDP ports as seen from the sound CPU
//!     $7F20-$7FFF  sound RAM
//!     $8000-$FFFF  banked program ROM view
//! $A10000-$A1001F  I/O ports (version, pads, serial)
//! $A11100-$A112FF  Sound CPU bus request / reset
//! $A14000-$A14003  TMSS latch
//! $C00000-$DFFFFF  VDP ports (mirrored every 32 bytes)
//! $E00000-$FFFFFF  Work RAM (64 KiB mirrored)
//! ```
//!
//! Everything else decodes to [`BusRegion::Unmapped`].

/// Device selected by an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusRegion {
    Rom,
    RomMirror,
    SoundRam,
    Synth,
    SoundVdp,
    SoundRomView,
    IoPorts,
    SoundCpuControl,
    Tmss,
    Vdp,
    WorkRam,
    Unmapped,
}

pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// Classify a 68000 address. Only the low 24 bits are decoded.
pub fn classify(address: u32) -> BusRegion {
    let address = address & ADDRESS_MASK;
    match address >> 16 {
        0x00..=0x3F => BusRegion::Rom,
        0x40..=0x9F => BusRegion::RomMirror,
        0xA0 => classify_sound_window(address as u16),
        0xA1 => classify_io(address as u16),
        0xC0..=0xDF => BusRegion::Vdp,
        0xE0..=0xFF => BusRegion::WorkRam,
        _ => BusRegion::Unmapped,
    }
}

/// Secondary decode of the 64 KiB sound CPU window, shared by both CPUs.
pub fn classify_sound_window(offset: u16) -> BusRegion {
    match offset {
        0x4000..=0x5FFF => BusRegion::Synth,
        0x7F00..=0x7F1F => BusRegion::SoundVdp,
        0x8000..=0xFFFF => BusRegion::SoundRomView,
        _ => BusRegion::SoundRam,
    }
}

fn classify_io(offset: u16) -> BusRegion {
    match offset {
        0x0000..=0x001F => BusRegion::IoPorts,
        0x1100..=0x12FF => BusRegion::SoundCpuControl,
        0x4000..=0x4003 => BusRegion::Tmss,
        _ => BusRegion::Unmapped,
    }
}
