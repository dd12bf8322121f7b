//! Build script for android-launch
//!
//! ## Android
//! Compiles the GstLaunchRemote field accessors in `native/`. Needs:
//! - `GST_LAUNCH_REMOTE_INCLUDE_DIR`: directory holding `gst-launch-remote.h`
//! - `GSTREAMER_ROOT_ANDROID`: the GStreamer Android SDK root
//!
//! Other targets build nothing; the binding is Android-only.

use std::env;
use std::path::PathBuf;

const SHIM: &str = "native/launch_remote_shim.c";

fn main() {
    println!("cargo:rerun-if-changed={SHIM}");
    println!("cargo:rerun-if-env-changed=GST_LAUNCH_REMOTE_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=GSTREAMER_ROOT_ANDROID");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("android") {
        return;
    }

    if let Err(e) = build_shim() {
        panic!("android-launch: {e}");
    }
}

/// GStreamer Android SDK directory name for the target architecture.
fn sdk_abi(arch: &str) -> Result<&'static str, String> {
    match arch {
        "aarch64" => Ok("arm64"),
        "arm" => Ok("armv7"),
        "x86" => Ok("x86"),
        "x86_64" => Ok("x86_64"),
        other => Err(format!("no GStreamer Android SDK for architecture {other}")),
    }
}

fn build_shim() -> Result<(), String> {
    let launch_include = env::var("GST_LAUNCH_REMOTE_INCLUDE_DIR")
        .map_err(|_| "GST_LAUNCH_REMOTE_INCLUDE_DIR not set".to_string())?;
    let sdk_root = env::var("GSTREAMER_ROOT_ANDROID")
        .map_err(|_| "GSTREAMER_ROOT_ANDROID not set".to_string())?;
    let arch = env::var("CARGO_CFG_TARGET_ARCH").map_err(|e| e.to_string())?;
    let sdk = PathBuf::from(sdk_root).join(sdk_abi(&arch)?);

    cc::Build::new()
        .file(SHIM)
        .include(launch_include)
        .include(sdk.join("include/gstreamer-1.0"))
        .include(sdk.join("include/glib-2.0"))
        .include(sdk.join("lib/glib-2.0/include"))
        .warnings(true)
        .compile("android_launch_shim");
    Ok(())
}
