//! Build script for taillight-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates vehicle.cfg at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use taillight_core::config::{text, Config};

/// Light outputs on the board (`board::LIGHT_COUNT`)
const BOARD_LIGHTS: usize = 5;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Apply vehicle.cfg to a default config and fail the build on any rejected line
fn validate_config() {
    println!("cargo:rerun-if-changed=vehicle.cfg");

    let config_path = Path::new("vehicle.cfg");
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => panic!("\n  ERROR: failed to read vehicle.cfg: {}\n", e),
    };

    // Same preparation as the firmware: every board light is addressable
    let mut config = Config::default();
    while config.lights.len() < BOARD_LIGHTS {
        let _ = config.lights.push(Default::default());
    }

    let mut errors = Vec::new();
    text::apply(&mut config, &content, |line, error| {
        errors.push(format!("  line {}: {:?}", line, error));
    });

    if !errors.is_empty() {
        panic!(
            "\n  ERROR: vehicle.cfg has {} invalid line(s):\n{}\n",
            errors.len(),
            errors.join("\n")
        );
    }
}
