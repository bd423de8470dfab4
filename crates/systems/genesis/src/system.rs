//! Sega Genesis main system implementation

use crate::bus::{MemoryBus, MAX_ROM_SIZE};
use crate::config::{version_register, ConsoleRegion, GenesisConfig, VideoStandard};
use crate::cpu::{IdleCpu, MainCpu};
use crate::scheduler::FrameScheduler;
use crate::sound::{IdleSoundCpu, LatchingSynth, SoundCpu, Synthesizer};
use crate::vdp::Vdp;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde_json::Value;
use thiserror::Error;

const CARTRIDGE_MOUNT: &str = "Cartridge";
const SNAPSHOT_SYSTEM: &str = "genesis";

/// Genesis emulator errors
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("ROM image is {size} bytes, the cartridge window holds at most {max}")]
    RomTooLarge { size: usize, max: usize },
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("No cartridge loaded")]
    NoCartridge,
}

/// Sega Genesis / Mega Drive
pub struct GenesisSystem {
    bus: MemoryBus,
    main_cpu: Box<dyn MainCpu>,
    sound_cpu: Box<dyn SoundCpu>,
    scheduler: FrameScheduler,

    config: GenesisConfig,
    region: ConsoleRegion,
    cartridge_loaded: bool,
}

impl GenesisSystem {
    /// System with stand-in CPUs and synthesizer.
    pub fn new() -> Self {
        Self::with_config(GenesisConfig::default())
    }

    pub fn with_config(config: GenesisConfig) -> Self {
        Self::with_components(
            config,
            Box::new(IdleCpu::new()),
            Box::new(IdleSoundCpu::new()),
            Box::new(LatchingSynth::new()),
        )
    }

    /// System driving the given CPU cores and synthesizer.
    pub fn with_components(
        config: GenesisConfig,
        main_cpu: Box<dyn MainCpu>,
        sound_cpu: Box<dyn SoundCpu>,
        synth: Box<dyn Synthesizer>,
    ) -> Self {
        let standard = config.video_standard.unwrap_or(VideoStandard::Ntsc);
        let region = config.console_region.unwrap_or(ConsoleRegion::Americas);
        let mut system = Self {
            bus: MemoryBus::with_synth(synth),
            main_cpu,
            sound_cpu,
            scheduler: FrameScheduler::new(standard),
            config,
            region,
            cartridge_loaded: false,
        };
        system.apply_region(region, standard);
        system
    }

    /// Load a cartridge image and reset. Oversized images are rejected
    /// before anything is changed.
    pub fn load_cartridge(&mut self, data: &[u8]) -> Result<(), GenesisError> {
        if data.len() > MAX_ROM_SIZE {
            return Err(GenesisError::RomTooLarge {
                size: data.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let (region, standard) = self.config.resolve(data);
        self.bus.load_rom(data);
        self.apply_region(region, standard);
        self.cartridge_loaded = true;

        log(LogCategory::Bus, LogLevel::Info, || {
            format!(
                "Genesis: loaded {} byte cartridge ({:?}, {:?})",
                data.len(),
                region,
                standard
            )
        });

        self.reset();
        Ok(())
    }

    fn apply_region(&mut self, region: ConsoleRegion, standard: VideoStandard) {
        self.region = region;
        self.scheduler.set_standard(standard);
        self.bus.vdp.set_pal(standard.is_pal());
        self.bus.io.set_version(version_register(region, standard));
    }

    pub fn region(&self) -> ConsoleRegion {
        self.region
    }

    pub fn video_standard(&self) -> VideoStandard {
        self.scheduler.standard()
    }

    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    /// Pressed buttons for pad `port` (0 or 1), see [`crate::io::buttons`].
    pub fn set_pad_state(&mut self, port: usize, pressed: u8) {
        self.bus.io.set_pad_state(port, pressed);
    }

    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    pub fn vdp(&self) -> &Vdp {
        &self.bus.vdp
    }
}

impl Default for GenesisSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for GenesisSystem {
    type Error = GenesisError;

    fn reset(&mut self) {
        self.bus.reset();
        self.scheduler.reset();
        self.main_cpu.reset(&mut self.bus);
        self.sound_cpu.reset(&mut self.bus);
        self.sound_cpu.set_reset(true);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if !self.cartridge_loaded {
            return Err(GenesisError::NoCartridge);
        }

        self.scheduler
            .run_frame(&mut self.bus, &mut *self.main_cpu, &mut *self.sound_cpu);
        Ok(self.bus.vdp.active_frame())
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "system": SNAPSHOT_SYSTEM,
            "version": 1,
            "region": self.region,
            "video_standard": self.video_standard(),
            "frames": self.scheduler.frame_count(),
            "main_cycles": self.scheduler.main_cycles(),
            "sound_cycles": self.scheduler.sound_cycles(),
            "bus": self.bus.snapshot(),
        })
    }

    /// Snapshots are diagnostic only; loading checks that one came from
    /// this system and otherwise leaves the machine untouched.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        use serde::de::Error as _;

        match v.get("system").and_then(Value::as_str) {
            Some(SNAPSHOT_SYSTEM) => Ok(()),
            Some(other) => Err(serde_json::Error::custom(format!(
                "snapshot is for system '{}'",
                other
            ))),
            None => Err(serde_json::Error::custom("snapshot has no system tag")),
        }
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_MOUNT.to_string(),
            name: "Cartridge".to_string(),
            extensions: vec![
                "md".to_string(),
                "gen".to_string(),
                "bin".to_string(),
                "smd".to_string(),
            ],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(GenesisError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.load_cartridge(data)
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(GenesisError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.bus.unload_rom();
        self.cartridge_loaded = false;
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_MOUNT && self.cartridge_loaded
    }
}
