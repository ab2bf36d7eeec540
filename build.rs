//! Build script for the CPAP controller firmware.
//!
//! The board binary links against the esp-hal linker scripts. Host builds (unit tests) must not
//! see those arguments, so they are only emitted for binaries when the `board` feature is on.

use std::env;

fn main() {
    if env::var_os("CARGO_FEATURE_BOARD").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
