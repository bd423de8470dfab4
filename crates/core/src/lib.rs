//! Core emulator primitives and traits shared by system crates.

pub mod logging;
pub mod renderer;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A finished video frame in ARGB8888.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Pixel at (x, y), or `None` outside the frame.
        pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }
    }
}

use serde_json::Value;

/// A processor core driven in bounded time slices against a bus `B`.
///
/// `execute` runs whole instructions until at least `budget` cycles have
/// elapsed and returns the cycles actually consumed, which may overshoot.
pub trait Cpu<B: ?Sized> {
    fn reset(&mut self, bus: &mut B);
    fn execute(&mut self, bus: &mut B, budget: u32) -> u32;
}

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Return a JSON snapshot of emulator state for debugging.
    /// Snapshots never include cartridge data.
    fn save_state(&self) -> Value;

    /// Load a JSON snapshot produced by `save_state`.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports full save/load state
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_initialization() {
        let f = types::Frame::new(10, 10);
        assert_eq!(f.pixels.len(), 100);
        assert_eq!(f.width, 10);
        assert_eq!(f.height, 10);
    }

    #[test]
    fn frame_pixel_bounds() {
        let mut f = types::Frame::new(4, 2);
        f.pixels[5] = 0xFF112233;
        assert_eq!(f.pixel(1, 1), Some(0xFF112233));
        assert_eq!(f.pixel(4, 0), None);
        assert_eq!(f.pixel(0, 2), None);
    }

    struct CountingBus {
        ticks: u32,
    }

    struct FixedStepCpu {
        step: u32,
    }

    impl Cpu<CountingBus> for FixedStepCpu {
        fn reset(&mut self, bus: &mut CountingBus) {
            bus.ticks = 0;
        }

        fn execute(&mut self, bus: &mut CountingBus, budget: u32) -> u32 {
            let mut consumed = 0;
            while consumed < budget {
                consumed += self.step;
                bus.ticks += 1;
            }
            consumed
        }
    }

    #[test]
    fn cpu_execute_overshoots_to_instruction_boundary() {
        let mut bus = CountingBus { ticks: 0 };
        let mut cpu = FixedStepCpu { step: 6 };
        assert_eq!(cpu.execute(&mut bus, 10), 12);
        assert_eq!(bus.ticks, 2);
        cpu.reset(&mut bus);
        assert_eq!(bus.ticks, 0);
    }

    struct MockSystem;

    impl System for MockSystem {
        type Error = std::convert::Infallible;

        fn reset(&mut self) {}

        fn step_frame(&mut self) -> Result<types::Frame, Self::Error> {
            Ok(types::Frame::new(2, 2))
        }

        fn save_state(&self) -> serde_json::Value {
            serde_json::json!({"mock": true, "version": 1})
        }

        fn load_state(&mut self, _v: &serde_json::Value) -> Result<(), serde_json::Error> {
            Ok(())
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            vec![MountPointInfo {
                id: "test".to_string(),
                name: "Test Slot".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            }]
        }

        fn mount(&mut self, _mount_point_id: &str, _data: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn unmount(&mut self, _mount_point_id: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        fn is_mounted(&self, _mount_point_id: &str) -> bool {
            false
        }
    }

    #[test]
    fn mock_system_snapshot_roundtrip() {
        let sys = MockSystem;
        let v = sys.save_state();
        let s = serde_json::to_string(&v).expect("serialize");
        let v2: serde_json::Value = serde_json::from_str(&s).expect("deserialize");
        let mut sys2 = MockSystem;
        assert!(sys2.load_state(&v2).is_ok());
        assert!(!sys2.supports_save_states());
    }
}
