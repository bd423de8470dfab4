//! Sega 315-5313 Video Display Processor
//!
//! The VDP owns 64 KiB of VRAM, 64 words of CRAM, 40 (of 64) words of
//! VSRAM and the register file. The CPU talks to it through a data port
//! and a control port; see [`ports`] for the command protocol and [`dma`]
//! for the three transfer modes. [`render`] composites one line at a time
//! into an internal 320×240 framebuffer.
//!
//! # Features
//! - Two scrolling planes plus the window plane
//! - 80 sprites (64 in H32) reached through a linked list
//! - Full/cell/line horizontal scroll, full/2-cell vertical scroll
//! - H/V counter with optional latch

pub mod dma;
pub mod ports;
pub mod registers;
pub mod render;

use emu_core::renderer::Renderer;
use emu_core::types::Frame;
use serde::Serialize;

pub use dma::DmaSource;
pub use ports::{AccessTarget, ControlLatch, VdpPort, WriteFifo};
pub use registers::{DmaMode, HScrollMode, VScrollMode, VdpRegisters};

pub const VRAM_SIZE: usize = 0x10000;
pub const CRAM_ENTRIES: usize = 64;
pub const VSRAM_ENTRIES: usize = 64;
/// Sprite attribute cache size (80 entries of 8 bytes, rounded up).
pub const SAT_CACHE_SIZE: usize = 0x400;

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;
pub const BLACK: u32 = 0xFF00_0000;

pub(crate) const STATUS_FIXED_BITS: u16 = 0x3400;
pub(crate) const STATUS_FIFO_EMPTY: u16 = 0x0200;
pub(crate) const STATUS_VINT_OCCURRED: u16 = 0x0080;
pub(crate) const STATUS_VBLANK: u16 = 0x0008;
pub(crate) const STATUS_HBLANK: u16 = 0x0004;
pub(crate) const STATUS_PAL: u16 = 0x0001;

/// Beam position as set by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BeamPosition {
    pub line: u16,
    /// Master clocks elapsed since the start of the line
    pub mclk: u32,
}

/// VDP state and rendering
pub struct Vdp {
    pub(crate) regs: VdpRegisters,

    pub(crate) vram: Vec<u8>,
    pub(crate) cram: [u16; CRAM_ENTRIES],
    pub(crate) vsram: [u16; VSRAM_ENTRIES],
    pub(crate) sat_cache: [u8; SAT_CACHE_SIZE],

    pub(crate) fifo: WriteFifo,
    pub(crate) control: ControlLatch,
    pub(crate) fill_pending: bool,

    // Dynamic status bits only; fixed and PAL bits are merged on read
    pub(crate) status: u16,
    pub(crate) hv_latch: Option<u16>,
    pub(crate) beam: BeamPosition,
    pub(crate) pal: bool,
    pub(crate) lines_per_frame: u16,

    frame: Frame,
}

impl Vdp {
    pub fn new() -> Self {
        Self {
            regs: VdpRegisters::new(),
            vram: vec![0; VRAM_SIZE],
            cram: [0; CRAM_ENTRIES],
            vsram: [0; VSRAM_ENTRIES],
            sat_cache: [0; SAT_CACHE_SIZE],
            fifo: WriteFifo::new(),
            control: ControlLatch::default(),
            fill_pending: false,
            status: 0,
            hv_latch: None,
            beam: BeamPosition::default(),
            pal: false,
            lines_per_frame: 262,
            frame: Frame::new(FRAME_WIDTH, FRAME_HEIGHT),
        }
    }

    /// Select NTSC (262 lines) or PAL (313 lines) timing.
    pub fn set_pal(&mut self, pal: bool) {
        self.pal = pal;
        self.lines_per_frame = if pal { 313 } else { 262 };
    }

    pub fn is_pal(&self) -> bool {
        self.pal
    }

    pub fn lines_per_frame(&self) -> u16 {
        self.lines_per_frame
    }

    /// VRAM byte write, mirrored into the sprite cache when it lands in
    /// the active sprite attribute table.
    pub fn vram_write(&mut self, address: u16, value: u8) {
        let address = address as usize;
        self.vram[address] = value;

        let base = self.regs.sprite_table_base() as usize;
        let size = self.regs.sprite_table_size();
        if address >= base && address < base + size {
            self.sat_cache[address - base] = value;
        }
    }

    /// Big-endian word at an even VRAM address.
    pub fn vram_word(&self, address: u16) -> u16 {
        let address = (address & 0xFFFE) as usize;
        u16::from_be_bytes([self.vram[address], self.vram[address | 1]])
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn cram(&self) -> &[u16] {
        &self.cram
    }

    pub fn vsram(&self) -> &[u16] {
        &self.vsram
    }

    pub fn sat_cache(&self) -> &[u8] {
        &self.sat_cache
    }

    pub fn control(&self) -> &ControlLatch {
        &self.control
    }

    pub fn fifo(&self) -> &WriteFifo {
        &self.fifo
    }

    pub fn fill_pending(&self) -> bool {
        self.fill_pending
    }

    pub fn set_beam(&mut self, line: u16, mclk: u32) {
        self.beam = BeamPosition { line, mclk };
    }

    pub fn beam(&self) -> BeamPosition {
        self.beam
    }

    /// Clear per-frame status and the framebuffer.
    pub fn begin_frame(&mut self) {
        self.status &= !(STATUS_VBLANK | STATUS_VINT_OCCURRED | STATUS_HBLANK);
        self.clear(BLACK);
    }

    pub fn set_vblank(&mut self, active: bool) {
        self.set_status_bit(STATUS_VBLANK, active);
    }

    pub fn set_hblank(&mut self, active: bool) {
        self.set_status_bit(STATUS_HBLANK, active);
    }

    pub fn set_vint_occurred(&mut self) {
        self.status |= STATUS_VINT_OCCURRED;
    }

    fn set_status_bit(&mut self, bit: u16, active: bool) {
        if active {
            self.status |= bit;
        } else {
            self.status &= !bit;
        }
    }

    /// The active display area copied out of the internal framebuffer.
    pub fn active_frame(&self) -> Frame {
        let width = (self.regs.screen_width() as u32).min(self.frame.width);
        let height = (self.regs.screen_height() as u32).min(self.frame.height);
        let mut out = Frame::new(width, height);
        if width == 0 || height == 0 {
            return out;
        }
        let stride = self.frame.width as usize;
        for (y, row) in out.pixels.chunks_exact_mut(width as usize).enumerate() {
            let start = y * stride;
            row.copy_from_slice(&self.frame.pixels[start..start + width as usize]);
        }
        out
    }

    /// Small serializable summary for the diagnostics snapshot.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "registers": self.regs.as_slice(),
            "code": self.control.code,
            "address": self.control.address,
            "pending": self.control.pending,
            "fill_pending": self.fill_pending,
            "status": self.peek_status(),
            "beam": self.beam,
            "pal": self.pal,
        })
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for Vdp {
    fn get_frame(&self) -> &Frame {
        &self.frame
    }

    fn get_frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    fn clear(&mut self, color: u32) {
        self.frame.pixels.fill(color);
    }

    fn reset(&mut self) {
        self.regs.clear();
        self.vram.fill(0);
        self.cram.fill(0);
        self.vsram.fill(0);
        self.sat_cache.fill(0);
        self.fifo = WriteFifo::new();
        self.control = ControlLatch::default();
        self.fill_pending = false;
        self.status = 0;
        self.hv_latch = None;
        self.beam = BeamPosition::default();
        self.clear(BLACK);
    }

    fn name(&self) -> &str {
        "Genesis VDP (315-5313)"
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.frame = Frame::new(width, height);
    }
}
