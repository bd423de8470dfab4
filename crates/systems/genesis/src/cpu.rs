//! Main CPU seam
//!
//! The 68000 core is an external collaborator. The system drives it
//! through [`Cpu`] in master-clock-derived slices and raises interrupts
//! through [`MainCpu::assert_interrupt`].

use crate::bus::MemoryBus;
use emu_core::Cpu;

/// Horizontal (line counter) interrupt level.
pub const HBLANK_INTERRUPT_LEVEL: u8 = 4;
/// Vertical blank interrupt level.
pub const VBLANK_INTERRUPT_LEVEL: u8 = 6;

/// A 68000-class CPU attached to the main bus.
pub trait MainCpu: Cpu<MemoryBus> {
    /// Raise an autovectored interrupt at `level` (1-7).
    fn assert_interrupt(&mut self, level: u8);
}

/// Stand-in CPU that burns its whole budget without touching the bus.
///
/// Lets the system run headless without a 68000 core plugged in. Interrupt
/// requests are counted per level.
#[derive(Debug, Default)]
pub struct IdleCpu {
    cycles: u64,
    interrupts: [u64; 8],
}

impl IdleCpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Interrupts raised at `level` since the last reset.
    pub fn interrupt_count(&self, level: u8) -> u64 {
        self.interrupts.get(level as usize).copied().unwrap_or(0)
    }
}

impl Cpu<MemoryBus> for IdleCpu {
    fn reset(&mut self, _bus: &mut MemoryBus) {
        self.cycles = 0;
        self.interrupts = [0; 8];
    }

    fn execute(&mut self, _bus: &mut MemoryBus, budget: u32) -> u32 {
        self.cycles += budget as u64;
        budget
    }
}

impl MainCpu for IdleCpu {
    fn assert_interrupt(&mut self, level: u8) {
        if let Some(count) = self.interrupts.get_mut(level as usize) {
            *count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_cpu_consumes_budget() {
        let mut bus = MemoryBus::new();
        let mut cpu = IdleCpu::new();
        assert_eq!(cpu.execute(&mut bus, 383), 383);
        assert_eq!(cpu.execute(&mut bus, 91), 91);
        assert_eq!(cpu.cycles(), 474);

        cpu.assert_interrupt(VBLANK_INTERRUPT_LEVEL);
        assert_eq!(cpu.interrupt_count(6), 1);
        assert_eq!(cpu.interrupt_count(4), 0);

        cpu.reset(&mut bus);
        assert_eq!(cpu.cycles(), 0);
        assert_eq!(cpu.interrupt_count(6), 0);
    }
}
