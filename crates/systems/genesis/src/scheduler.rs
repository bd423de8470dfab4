//! Frame scheduler
//!
//! Everything is timed in master clocks (MCLK). A line is 3420 MCLK; the
//! 68000 runs at MCLK/7 and the Z80 at MCLK/15 on hardware, approximated
//! here as MCLK/14. Each visible line is cut into slices:
//!
//! ```text
//! |<------- active 2680 ------->|<-- HBlank 636 -->|<- 104 ->|
//!  68000 + Z80, line counter     68000, then render   68000
//! ```
//!
//! The first VBlank line raises the vertical interrupt 788 MCLK in, the
//! remaining lines only run the CPUs. Each CPU tracks how far it overran
//! its last slice and starts the next one that much later.

use crate::bus::MemoryBus;
use crate::config::VideoStandard;
use crate::cpu::{MainCpu, HBLANK_INTERRUPT_LEVEL, VBLANK_INTERRUPT_LEVEL};
use crate::sound::SoundCpu;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::Cpu;

pub const MCLK_PER_LINE: u32 = 3420;
pub const MAIN_CLOCK_DIVIDER: u32 = 7;
pub const SOUND_CLOCK_DIVIDER: u32 = 14;

const ACTIVE_MCLK: u32 = 2680;
const HBLANK_MCLK: u32 = 636;
const LINE_TAIL_MCLK: u32 = MCLK_PER_LINE - ACTIVE_MCLK - HBLANK_MCLK;
const VBLANK_LEAD_MCLK: u32 = 588;
const VINT_DELAY_MCLK: u32 = 200;

/// Clock bookkeeping for one CPU.
#[derive(Debug, Clone, Copy, Default)]
struct Slice {
    divider: u32,
    /// MCLK already executed past the end of the last slice
    overrun: u32,
    total_cycles: u64,
}

impl Slice {
    fn new(divider: u32) -> Self {
        Self {
            divider,
            ..Self::default()
        }
    }

    /// CPU cycles to request for a slice of `mclk`, or `None` when the
    /// previous overrun already covers it.
    fn budget(&mut self, mclk: u32) -> Option<(u32, u32)> {
        if self.overrun >= mclk {
            self.overrun -= mclk;
            return None;
        }
        let wanted = mclk - self.overrun;
        Some((wanted, wanted.div_ceil(self.divider)))
    }

    fn settle(&mut self, wanted: u32, consumed: u32) {
        self.total_cycles += consumed as u64;
        self.overrun = (consumed * self.divider).saturating_sub(wanted);
    }
}

pub struct FrameScheduler {
    standard: VideoStandard,
    main: Slice,
    sound: Slice,
    sound_lines: (bool, bool),
    frames: u64,
}

impl FrameScheduler {
    pub fn new(standard: VideoStandard) -> Self {
        Self {
            standard,
            main: Slice::new(MAIN_CLOCK_DIVIDER),
            sound: Slice::new(SOUND_CLOCK_DIVIDER),
            sound_lines: (false, true),
            frames: 0,
        }
    }

    pub fn set_standard(&mut self, standard: VideoStandard) {
        self.standard = standard;
    }

    pub fn standard(&self) -> VideoStandard {
        self.standard
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.standard);
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn main_cycles(&self) -> u64 {
        self.main.total_cycles
    }

    pub fn sound_cycles(&self) -> u64 {
        self.sound.total_cycles
    }

    /// Run one full frame: visible lines, the VBlank line, then the rest
    /// of the vertical blank.
    pub fn run_frame(
        &mut self,
        bus: &mut MemoryBus,
        main: &mut dyn MainCpu,
        sound: &mut dyn SoundCpu,
    ) {
        let lines_per_frame = self.standard.lines_per_frame();
        bus.vdp.begin_frame();
        let visible = bus.vdp.registers().screen_height();
        let mut line_counter = bus.vdp.registers().line_counter_reload() as i32;

        for line in 0..visible {
            bus.vdp.set_beam(line, 0);
            self.run_main(bus, main, ACTIVE_MCLK);
            self.run_sound(bus, sound, MCLK_PER_LINE);

            line_counter -= 1;
            if line_counter < 0 {
                line_counter = bus.vdp.registers().line_counter_reload() as i32;
                if bus.vdp.registers().line_interrupt_enabled() {
                    log(LogCategory::Interrupts, LogLevel::Trace, || {
                        format!("INT: HBlank interrupt on line {}", line)
                    });
                    main.assert_interrupt(HBLANK_INTERRUPT_LEVEL);
                }
            }

            bus.vdp.set_hblank(true);
            bus.vdp.set_beam(line, ACTIVE_MCLK);
            self.run_main(bus, main, HBLANK_MCLK);
            bus.vdp.set_hblank(false);

            if bus.vdp.registers().display_enabled() {
                bus.vdp.render_line(line);
            }
            bus.tick_synth();

            bus.vdp.set_beam(line, ACTIVE_MCLK + HBLANK_MCLK);
            self.run_main(bus, main, LINE_TAIL_MCLK);
        }

        // First VBlank line
        bus.vdp.set_vblank(true);
        bus.vdp.set_beam(visible, 0);
        sound.set_interrupt(true);
        self.run_main(bus, main, VBLANK_LEAD_MCLK);

        bus.vdp.set_vint_occurred();
        bus.vdp.set_beam(visible, VBLANK_LEAD_MCLK);
        self.run_main(bus, main, VINT_DELAY_MCLK);
        if bus.vdp.registers().frame_interrupt_enabled() {
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                "INT: VBlank interrupt".to_string()
            });
            main.assert_interrupt(VBLANK_INTERRUPT_LEVEL);
        }

        bus.vdp.set_beam(visible, VBLANK_LEAD_MCLK + VINT_DELAY_MCLK);
        self.run_main(bus, main, MCLK_PER_LINE - VBLANK_LEAD_MCLK - VINT_DELAY_MCLK);
        self.run_sound(bus, sound, MCLK_PER_LINE);
        bus.tick_synth();
        sound.set_interrupt(false);

        for line in visible + 1..lines_per_frame {
            bus.vdp.set_beam(line, 0);
            self.run_main(bus, main, MCLK_PER_LINE);
            self.run_sound(bus, sound, MCLK_PER_LINE);
            bus.tick_synth();
        }

        self.frames += 1;
    }

    fn run_main(&mut self, bus: &mut MemoryBus, main: &mut dyn MainCpu, mclk: u32) {
        if let Some((wanted, cycles)) = self.main.budget(mclk) {
            let consumed = main.execute(bus, cycles);
            self.main.settle(wanted, consumed);
        }
    }

    /// Propagate latch changes, then run the sound CPU unless it is held.
    fn run_sound(&mut self, bus: &mut MemoryBus, sound: &mut dyn SoundCpu, mclk: u32) {
        let control = bus.sound_control;
        let (was_requested, was_reset) = self.sound_lines;
        if control.bus_requested != was_requested {
            sound.set_bus_request(control.bus_requested);
        }
        if control.reset_asserted != was_reset {
            sound.set_reset(control.reset_asserted);
            if !control.reset_asserted {
                sound.reset(bus);
            }
        }
        self.sound_lines = (control.bus_requested, control.reset_asserted);

        if control.holds_sound_cpu() {
            self.sound.overrun = 0;
            return;
        }
        if let Some((wanted, cycles)) = self.sound.budget(mclk) {
            let consumed = sound.execute(bus, cycles);
            self.sound.settle(wanted, consumed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Executes in fixed-size instructions and counts interrupts.
    struct StepCpu {
        step: u32,
        executed: u64,
        interrupts: Vec<u8>,
    }

    impl StepCpu {
        fn new(step: u32) -> Self {
            Self {
                step,
                executed: 0,
                interrupts: Vec::new(),
            }
        }
    }

    impl Cpu<MemoryBus> for StepCpu {
        fn reset(&mut self, _bus: &mut MemoryBus) {}

        fn execute(&mut self, _bus: &mut MemoryBus, budget: u32) -> u32 {
            let mut consumed = 0;
            while consumed < budget {
                consumed += self.step;
            }
            self.executed += consumed as u64;
            consumed
        }
    }

    impl MainCpu for StepCpu {
        fn assert_interrupt(&mut self, level: u8) {
            self.interrupts.push(level);
        }
    }

    #[derive(Default)]
    struct CountingSoundCpu {
        executed: u64,
        resets: u32,
        interrupt_edges: u32,
    }

    impl Cpu<MemoryBus> for CountingSoundCpu {
        fn reset(&mut self, _bus: &mut MemoryBus) {
            self.resets += 1;
        }

        fn execute(&mut self, _bus: &mut MemoryBus, budget: u32) -> u32 {
            self.executed += budget as u64;
            budget
        }
    }

    impl SoundCpu for CountingSoundCpu {
        fn set_bus_request(&mut self, _requested: bool) {}

        fn set_reset(&mut self, _asserted: bool) {}

        fn set_interrupt(&mut self, asserted: bool) {
            if asserted {
                self.interrupt_edges += 1;
            }
        }
    }

    const MAIN_CYCLES_PER_FRAME: u64 = (MCLK_PER_LINE as u64 * 262) / 7;

    #[test]
    fn test_slice_carries_overrun() {
        let mut slice = Slice::new(7);
        let (wanted, cycles) = slice.budget(70).expect("budget");
        assert_eq!((wanted, cycles), (70, 10));
        slice.settle(wanted, 14);
        assert_eq!(slice.overrun, 28);

        assert_eq!(slice.budget(20), None);
        assert_eq!(slice.overrun, 8);
        let (wanted, cycles) = slice.budget(22).expect("budget");
        assert_eq!((wanted, cycles), (14, 2));
    }

    #[test]
    fn test_main_cpu_gets_a_frame_of_cycles() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(1);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        let executed = main.executed;
        assert!(executed >= MAIN_CYCLES_PER_FRAME);
        assert!(executed <= MAIN_CYCLES_PER_FRAME + 262 * 3);
        assert_eq!(scheduler.frame_count(), 1);
    }

    #[test]
    fn test_overshoot_does_not_accumulate() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(37);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        for _ in 0..10 {
            scheduler.run_frame(&mut bus, &mut main, &mut sound);
        }
        let expected = MAIN_CYCLES_PER_FRAME * 10;
        assert!(main.executed >= expected);
        assert!(main.executed < expected + 37 * 2);
    }

    #[test]
    fn test_vblank_interrupt_when_enabled() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(4);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert!(main.interrupts.is_empty());

        bus.vdp.set_register(1, 0x24);
        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert_eq!(main.interrupts, vec![VBLANK_INTERRUPT_LEVEL]);
        assert_ne!(bus.vdp.peek_status() & 0x0088, 0);
    }

    #[test]
    fn test_line_interrupt_cadence() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(4);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        bus.vdp.set_register(0, 0x10);
        bus.vdp.set_register(10, 15);
        scheduler.run_frame(&mut bus, &mut main, &mut sound);

        let hints = main
            .interrupts
            .iter()
            .filter(|&&level| level == HBLANK_INTERRUPT_LEVEL)
            .count();
        // Fires on lines 15, 31, ... 223
        assert_eq!(hints, 224 / 16);
    }

    #[test]
    fn test_sound_cpu_held_until_reset_released() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(4);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert_eq!(sound.executed, 0);
        assert_eq!(sound.interrupt_edges, 1);

        bus.write16(0xA11200, 0x0100);
        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert_eq!(sound.resets, 1);
        let per_frame = (MCLK_PER_LINE as u64 * 262) / SOUND_CLOCK_DIVIDER as u64;
        assert!(sound.executed >= per_frame);

        bus.write16(0xA11100, 0x0100);
        let before = sound.executed;
        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert_eq!(sound.executed, before);
    }

    #[test]
    fn test_pal_frame_runs_more_lines() {
        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(1);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Pal);

        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert!(main.executed >= (MCLK_PER_LINE as u64 * 313) / 7);
    }

    #[test]
    fn test_display_disabled_leaves_frame_black() {
        use emu_core::renderer::Renderer;

        let mut bus = MemoryBus::new();
        let mut main = StepCpu::new(4);
        let mut sound = CountingSoundCpu::default();
        let mut scheduler = FrameScheduler::new(VideoStandard::Ntsc);

        bus.vdp.set_register(1, 0x04);
        bus.vdp.set_register(7, 0x01);
        bus.vdp.cram[1] = 0x0EEE;
        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert!(bus.vdp.get_frame().pixels.iter().all(|&p| p == 0xFF000000));

        bus.vdp.set_register(1, 0x44);
        scheduler.run_frame(&mut bus, &mut main, &mut sound);
        assert_eq!(bus.vdp.get_frame().pixel(0, 0), Some(0xFFE0E0E0));
    }
}
