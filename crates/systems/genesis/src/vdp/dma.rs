//! VDP DMA engine
//!
//! Three transfer types, selected by register 23:
//! - memory to VDP: words from cartridge/work RAM to VRAM, CRAM or VSRAM
//! - fill: armed by the command, runs on the next data port write
//! - copy: VRAM to VRAM, byte at a time
//!
//! Transfers complete instantly. The source registers are written back
//! and the length registers cleared afterwards.

use super::ports::cram_index;
use super::{AccessTarget, DmaMode, Vdp};
use emu_core::logging::{log, LogCategory, LogLevel};

/// Read-only view of the memory a memory-to-VDP transfer can read.
pub trait DmaSource {
    /// Big-endian word at a 68000 byte address.
    fn read_dma_word(&self, address: u32) -> u16;
}

impl Vdp {
    /// Start the transfer selected by register 23. Ignored while DMA is
    /// disabled in register 1.
    pub fn trigger_dma(&mut self, source: &dyn DmaSource) {
        if !self.regs.dma_enabled() {
            log(LogCategory::Dma, LogLevel::Debug, || {
                "DMA: request ignored, DMA disabled".to_string()
            });
            return;
        }

        match self.regs.dma_mode() {
            DmaMode::MemoryToVdp => self.dma_memory_to_vdp(source),
            DmaMode::Fill => {
                log(LogCategory::Dma, LogLevel::Debug, || {
                    format!(
                        "DMA: fill armed at {:04X}, length {}",
                        self.control.address,
                        self.transfer_length()
                    )
                });
                self.fill_pending = true;
            }
            DmaMode::Copy => self.dma_copy(),
        }
    }

    /// A length register value of zero means 0x10000.
    fn transfer_length(&self) -> u32 {
        match self.regs.dma_length() {
            0 => 0x10000,
            length => length as u32,
        }
    }

    fn dma_memory_to_vdp(&mut self, source: &dyn DmaSource) {
        let length = self.transfer_length();
        let high = (self.regs.dma_source_high() as u32) << 16;
        let mut source_low = self.regs.dma_source_low();
        let target = self.control.target();

        log(LogCategory::Dma, LogLevel::Debug, || {
            format!(
                "DMA: {} words from {:06X} to {:?} {:04X}",
                length,
                (high | source_low as u32) << 1,
                target,
                self.control.address
            )
        });
        if !matches!(
            target,
            AccessTarget::VramWrite | AccessTarget::CramWrite | AccessTarget::VsramWrite
        ) {
            log(LogCategory::Dma, LogLevel::Warn, || {
                format!("DMA: memory transfer with non-write target {:?}", target)
            });
        }

        for _ in 0..length {
            let word = source.read_dma_word((high | source_low as u32) << 1);
            self.fifo.push(word);

            let address = self.control.address;
            match target {
                AccessTarget::VramWrite => {
                    let [hi, lo] = word.to_be_bytes();
                    self.vram_write(address, hi);
                    self.vram_write(address ^ 1, lo);
                }
                AccessTarget::CramWrite => self.cram[cram_index(address)] = word,
                AccessTarget::VsramWrite => self.vsram[cram_index(address)] = word,
                _ => {}
            }

            self.advance_address();
            source_low = source_low.wrapping_add(1);
        }

        self.regs.finish_dma(source_low);
    }

    /// Run an armed fill after the data port write that triggered it.
    pub(crate) fn run_fill(&mut self, value: u16) {
        self.fill_pending = false;

        let length = self.transfer_length();
        let mut source_low = self.regs.dma_source_low();
        let target = self.control.target();
        let [fill_byte, _] = value.to_be_bytes();

        for _ in 0..length {
            let address = self.control.address;
            match target {
                AccessTarget::VramWrite => self.vram_write(address ^ 1, fill_byte),
                AccessTarget::CramWrite => self.cram[cram_index(address)] = self.fifo.oldest(),
                AccessTarget::VsramWrite => self.vsram[cram_index(address)] = self.fifo.oldest(),
                _ => {}
            }
            self.advance_address();
            source_low = source_low.wrapping_add(1);
        }

        self.regs.finish_dma(source_low);
    }

    fn dma_copy(&mut self) {
        let length = self.transfer_length();
        let mut source_low = self.regs.dma_source_low();

        log(LogCategory::Dma, LogLevel::Debug, || {
            format!(
                "DMA: copy {} bytes {:04X} -> {:04X}",
                length, source_low, self.control.address
            )
        });

        for _ in 0..length {
            let value = self.vram[(source_low ^ 1) as usize];
            self.vram_write(self.control.address ^ 1, value);
            self.advance_address();
            source_low = source_low.wrapping_add(1);
        }

        self.regs.finish_dma(source_low);
    }
}
