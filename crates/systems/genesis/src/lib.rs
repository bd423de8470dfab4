//! Sega Genesis / Mega Drive emulator implementation
//!
//! This crate implements the Genesis memory map, the 315-5313 VDP and the
//! frame timing that ties them to the CPUs.
//!
//! # Architecture
//!
//! - **CPU**: Motorola 68000 @ 7.67 MHz (NTSC), plugged in through [`MainCpu`]
//! - **Sound CPU**: Zilog Z80 @ 3.58 MHz, plugged in through [`SoundCpu`]
//! - **Sound**: YM2612 FM + SN76489 PSG, plugged in through [`Synthesizer`]
//! - **VDP**: Sega 315-5313 with 64 KB VRAM, 128 bytes CRAM, 80 bytes VSRAM
//! - **RAM**: 64 KB work RAM, 32 KB sound RAM window
//!
//! The CPU cores are external; [`IdleCpu`] and [`IdleSoundCpu`] stand in
//! for them so the video side can run on its own.

pub mod address;
pub mod bus;
pub mod config;
pub mod cpu;
pub mod io;
pub mod scheduler;
pub mod sound;
mod system;
pub mod vdp;

pub use bus::MemoryBus;
pub use config::{ConsoleRegion, GenesisConfig, VideoStandard};
pub use cpu::{IdleCpu, MainCpu};
pub use sound::{IdleSoundCpu, LatchingSynth, SoundCpu, Synthesizer};
pub use system::{GenesisError, GenesisSystem};
pub use vdp::Vdp;
