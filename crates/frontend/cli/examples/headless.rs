use emu_core::System;
use emu_genesis::vdp::DmaSource;
use emu_genesis::GenesisSystem;
use std::env;

struct NoMemory;

impl DmaSource for NoMemory {
    fn read_dma_word(&self, _address: u32) -> u16 {
        0
    }
}

/// Runs a blank cartridge, or the ROM given as the first argument, for one
/// frame with a green backdrop.
fn main() {
    let rom = match env::args().nth(1) {
        Some(path) => std::fs::read(&path).expect("read ROM"),
        None => vec![0u8; 0x400],
    };

    let mut sys = GenesisSystem::default();
    sys.mount("Cartridge", &rom).expect("mount cartridge");

    let vdp = &mut sys.bus_mut().vdp;
    vdp.set_register(0x01, 0x44);
    vdp.write_control(0xC000, &NoMemory);
    vdp.write_control(0x0000, &NoMemory);
    vdp.write_data(0x00E0);

    let frame = sys.step_frame().expect("frame");
    println!("Headless Genesis frame: {}x{}", frame.width, frame.height);
    println!("First pixel: {:08X}", frame.pixels[0]);
    println!(
        "Save-state: {}",
        serde_json::to_string_pretty(&sys.save_state()).expect("serialize")
    );
}
