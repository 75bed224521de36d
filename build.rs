use std::env;

fn main() {
    println!("cargo:rerun-if-changed=imetrail.manifest");
    // Build scripts run on the host; the target comes from Cargo's env.
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let toolchain = env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if os != "windows" {
        return;
    }
    if toolchain == "msvc" {
        // PerMonitorV2 awareness: cursor coordinates arrive in physical pixels.
        println!("cargo:rustc-link-arg-bins=/MANIFEST:EMBED");
        println!("cargo:rustc-link-arg-bins=/MANIFESTINPUT:imetrail.manifest");
        println!("cargo:rustc-link-arg-bins=/MANIFESTUAC:level='asInvoker' uiAccess='false'");
    } else {
        println!(
            "cargo:warning=imetrail.manifest is only embedded with the MSVC linker; DPI awareness falls back to the system default"
        );
    }
}
