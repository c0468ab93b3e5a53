//! Linker setup for the firmware image.
//!
//! Host builds (unit and integration tests) need nothing from here; the
//! linker scripts are only passed when the `embedded` feature is compiled
//! for a Cortex-M target.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    let embedded = env::var_os("CARGO_FEATURE_EMBEDDED").is_some();
    let target = env::var("TARGET").unwrap_or_default();
    if !embedded || !target.starts_with("thumb") {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
