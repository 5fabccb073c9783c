use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Debug builds get the verbose log level
    if env::var("PROFILE").map(|p| p == "debug").unwrap_or(false) {
        println!("cargo:rustc-cfg=feature=\"debug\"");
    }

    // Host builds only compile the portable library and its tests
    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("avr") {
        return;
    }

    // Configure for ATmega128
    println!("cargo:rustc-link-arg=-mmcu=atmega128");

    println!("cargo:warning=Building ESC firmware for ATmega128 at 16MHz");
}
