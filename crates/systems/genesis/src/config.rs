//! Console configuration and cartridge header region detection

use serde::{Deserialize, Serialize};

/// Offset of the region string in the cartridge header.
pub const HEADER_REGION_OFFSET: usize = 0x1F0;

/// Video timing standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    Ntsc,
    Pal,
}

impl VideoStandard {
    pub fn lines_per_frame(self) -> u16 {
        match self {
            VideoStandard::Ntsc => 262,
            VideoStandard::Pal => 313,
        }
    }

    pub fn is_pal(self) -> bool {
        self == VideoStandard::Pal
    }
}

/// Console region reported through the version register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleRegion {
    Japan,
    Americas,
    Europe,
}

impl ConsoleRegion {
    pub fn overseas(self) -> bool {
        self != ConsoleRegion::Japan
    }

    /// Timing a console of this region would normally use.
    pub fn default_standard(self) -> VideoStandard {
        match self {
            ConsoleRegion::Europe => VideoStandard::Pal,
            _ => VideoStandard::Ntsc,
        }
    }
}

/// User overrides. `None` fields are resolved from the cartridge header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub video_standard: Option<VideoStandard>,
    pub console_region: Option<ConsoleRegion>,
}

impl GenesisConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Resolve region and timing for a cartridge image.
    pub fn resolve(&self, rom: &[u8]) -> (ConsoleRegion, VideoStandard) {
        let region = self.console_region.unwrap_or_else(|| detect_region(rom));
        let standard = self
            .video_standard
            .unwrap_or_else(|| region.default_standard());
        (region, standard)
    }
}

/// Region from the first character of the header region string.
///
/// `J`/`1` mean Japan, `E`/`A` Europe, everything else (including a
/// missing header) the Americas.
pub fn detect_region(rom: &[u8]) -> ConsoleRegion {
    match rom.get(HEADER_REGION_OFFSET) {
        Some(b'J') | Some(b'1') => ConsoleRegion::Japan,
        Some(b'E') | Some(b'A') => ConsoleRegion::Europe,
        _ => ConsoleRegion::Americas,
    }
}

/// Version register value: bit 7 overseas, bit 6 PAL, bit 5 no expansion unit.
pub fn version_register(region: ConsoleRegion, standard: VideoStandard) -> u8 {
    let mut version = 0x20;
    if region.overseas() {
        version |= 0x80;
    }
    if standard.is_pal() {
        version |= 0x40;
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_region(code: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x200];
        rom[HEADER_REGION_OFFSET] = code;
        rom
    }

    #[test]
    fn test_detect_region() {
        assert_eq!(detect_region(&rom_with_region(b'J')), ConsoleRegion::Japan);
        assert_eq!(detect_region(&rom_with_region(b'1')), ConsoleRegion::Japan);
        assert_eq!(detect_region(&rom_with_region(b'E')), ConsoleRegion::Europe);
        assert_eq!(detect_region(&rom_with_region(b'A')), ConsoleRegion::Europe);
        assert_eq!(detect_region(&rom_with_region(b'U')), ConsoleRegion::Americas);
        assert_eq!(detect_region(&[]), ConsoleRegion::Americas);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let rom = rom_with_region(b'E');
        assert_eq!(
            GenesisConfig::default().resolve(&rom),
            (ConsoleRegion::Europe, VideoStandard::Pal)
        );

        let config = GenesisConfig {
            video_standard: Some(VideoStandard::Ntsc),
            console_region: None,
        };
        assert_eq!(config.resolve(&rom), (ConsoleRegion::Europe, VideoStandard::Ntsc));
    }

    #[test]
    fn test_version_register() {
        assert_eq!(version_register(ConsoleRegion::Americas, VideoStandard::Ntsc), 0xA0);
        assert_eq!(version_register(ConsoleRegion::Europe, VideoStandard::Pal), 0xE0);
        assert_eq!(version_register(ConsoleRegion::Japan, VideoStandard::Ntsc), 0x20);
    }

    #[test]
    fn test_config_from_json() {
        let config = GenesisConfig::from_json(r#"{"video_standard":"pal"}"#).expect("parse");
        assert_eq!(config.video_standard, Some(VideoStandard::Pal));
        assert_eq!(config.console_region, None);

        assert!(GenesisConfig::from_json(r#"{"video_standard":"secam"}"#).is_err());
    }
}
