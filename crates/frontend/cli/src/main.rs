use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::types::Frame;
use emu_core::System;
use emu_genesis::{GenesisConfig, GenesisSystem, VideoStandard};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RegionArg {
    /// Take timing from the cartridge header
    Auto,
    Ntsc,
    Pal,
}

#[derive(Parser)]
#[command(about = "Headless Sega Genesis runner")]
struct Args {
    /// Path to a cartridge image (.md, .gen, .bin)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Video timing override
    #[arg(long, value_enum, default_value_t = RegionArg::Auto)]
    region: RegionArg,

    /// JSON file with a GenesisConfig
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON snapshot of the machine after the last frame
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write the last frame as a PNG image
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Global emulator log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Per-category level as CATEGORY=LEVEL, e.g. vdp=debug (repeatable)
    #[arg(long)]
    log_category: Vec<String>,

    /// Send emulator logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();

    let Some(level) = LogLevel::parse(&args.log_level) else {
        bail!("Unknown log level: {}", args.log_level);
    };
    config.set_global_level(level);

    for entry in &args.log_category {
        let Some((name, level)) = entry.split_once('=') else {
            bail!("Expected CATEGORY=LEVEL, got '{}'", entry);
        };
        let category = LogCategory::parse(name)
            .with_context(|| format!("Unknown log category: {}", name))?;
        let level =
            LogLevel::parse(level).with_context(|| format!("Unknown log level: {}", level))?;
        config.set_level(category, level);
    }

    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("Opening log file {}", path.display()))?;
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<GenesisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Reading config {}", path.display()))?;
            GenesisConfig::from_json(&text)
                .with_context(|| format!("Parsing config {}", path.display()))?
        }
        None => GenesisConfig::default(),
    };

    match args.region {
        RegionArg::Auto => {}
        RegionArg::Ntsc => config.video_standard = Some(VideoStandard::Ntsc),
        RegionArg::Pal => config.video_standard = Some(VideoStandard::Pal),
    }
    Ok(config)
}

/// Save a frame as an 8-bit RGBA PNG.
fn write_png(path: &Path, frame: &Frame) -> Result<()> {
    let out = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(out, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let data: Vec<u8> = frame
        .pixels
        .iter()
        .flat_map(|&argb| {
            let [a, r, g, b] = argb.to_be_bytes();
            [r, g, b, a]
        })
        .collect();

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    configure_logging(&args)?;
    let config = load_config(&args)?;

    let rom = fs::read(&args.rom).with_context(|| format!("Reading {}", args.rom.display()))?;
    let mut sys = GenesisSystem::with_config(config);
    sys.mount("Cartridge", &rom)?;
    log::info!(
        "Loaded {} ({} bytes, {:?}, {:?})",
        args.rom.display(),
        rom.len(),
        sys.region(),
        sys.video_standard()
    );

    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }

    let mut frame = sys.step_frame()?;
    for _ in 1..args.frames {
        frame = sys.step_frame()?;
    }
    log::info!(
        "Ran {} frames, last frame {}x{}",
        sys.frame_count(),
        frame.width,
        frame.height
    );

    if let Some(path) = &args.dump {
        write_png(path, &frame).with_context(|| format!("Writing {}", path.display()))?;
        log::info!("Frame written to {}", path.display());
    }

    if let Some(path) = &args.save {
        let state = sys.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
        log::info!("Snapshot written to {}", path.display());
    }

    LogConfig::global().clear_log_file();
    Ok(())
}
