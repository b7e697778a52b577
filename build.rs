//! Points Windows builds at a vcpkg FFmpeg when `ffmpeg-sys-next` would
//! otherwise fail to find one.

use std::env;
use std::path::PathBuf;

const WATCHED: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];
const DEFAULT_TRIPLET: &str = "x64-windows";

fn warn(message: &str) {
    println!("cargo:warning={message}");
}

fn vcpkg_ffmpeg_dir() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| DEFAULT_TRIPLET.to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}

fn main() {
    for name in WATCHED {
        println!("cargo:rerun-if-env-changed={name}");
    }

    let is_windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !is_windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    match vcpkg_ffmpeg_dir() {
        None => warn(
            "framelag needs FFmpeg development libraries; set FFMPEG_DIR or install FFmpeg with vcpkg and set VCPKG_ROOT.",
        ),
        Some(dir) if dir.exists() => {
            warn(&format!(
                "Using vcpkg FFmpeg candidate {}; set FFMPEG_DIR to it to silence this warning.",
                dir.display()
            ));
            if env::var_os("VCPKGRS_DYNAMIC").is_none() {
                warn("Set VCPKGRS_DYNAMIC=1 if the vcpkg FFmpeg build is dynamic.");
            }
        }
        Some(dir) => warn(&format!(
            "VCPKG_ROOT is set but {} does not exist; FFmpeg discovery will likely fail.",
            dir.display()
        )),
    }
}
