//! Build script for whindy-location.
//!
//! On Apple targets this generates the Swift side of the location bridge.

use std::env;

fn main() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();

    if target_os == "ios" || target_os == "macos" {
        build_apple();
    }
}

#[cfg(any(target_os = "ios", target_os = "macos"))]
fn build_apple() {
    use std::path::PathBuf;

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let bridges = vec!["src/sys/apple/mod.rs"];
    for bridge in &bridges {
        println!("cargo:rerun-if-changed={bridge}");
    }

    swift_bridge_build::parse_bridges(bridges)
        .write_all_concatenated(out_dir, env!("CARGO_PKG_NAME"));
}

#[cfg(not(any(target_os = "ios", target_os = "macos")))]
fn build_apple() {}
