use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pinned OpenAL Soft release tag.
const OPENAL_SOFT_TAG: &str = "1.25.1";
const OPENAL_SOFT_REPO: &str = "https://github.com/kcat/openal-soft.git";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OPENAL_SOFT_SRC");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    // A local checkout can be supplied for offline builds.
    let src_dir = match env::var_os("OPENAL_SOFT_SRC") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let dir = out_dir.join("openal-soft-src");
            fetch_sources(&dir);
            dir
        }
    };

    let dst = build_library(&src_dir);
    println!("cargo:rustc-link-search=native={}/lib", dst.display());
    emit_link_libs();
}

fn fetch_sources(src_dir: &Path) {
    if src_dir.join("CMakeLists.txt").exists() {
        return;
    }

    eprintln!("openal-soft-sys: cloning OpenAL Soft {} ...", OPENAL_SOFT_TAG);
    let status = Command::new("git")
        .args(["clone", "--depth", "1", "--branch", OPENAL_SOFT_TAG, OPENAL_SOFT_REPO])
        .arg(src_dir)
        .status()
        .expect("failed to run git; is it installed and in PATH?");
    assert!(
        status.success(),
        "git clone of OpenAL Soft {} failed",
        OPENAL_SOFT_TAG
    );
}

/// Static Release build. Debug CRT symbols are missing when Rust links
/// against the release CRT on MSVC.
fn build_library(src_dir: &Path) -> PathBuf {
    cmake::Config::new(src_dir)
        .profile("Release")
        .define("LIBTYPE", "STATIC")
        .define("ALSOFT_UTILS", "OFF")
        .define("ALSOFT_EXAMPLES", "OFF")
        .define("ALSOFT_TESTS", "OFF")
        .define("ALSOFT_EAX", "OFF")
        .define("ALSOFT_INSTALL", "ON")
        .define("ALSOFT_INSTALL_CONFIG", "OFF")
        .define("ALSOFT_INSTALL_HRTF_DATA", "OFF")
        .define("ALSOFT_INSTALL_AMBDEC_PRESETS", "OFF")
        .build()
}

fn emit_link_libs() {
    let libs: &[&str] = if cfg!(target_os = "windows") {
        &["static=OpenAL32", "winmm", "ole32"]
    } else if cfg!(target_os = "macos") {
        &[
            "static=openal",
            "framework=AudioToolbox",
            "framework=CoreAudio",
            "framework=CoreFoundation",
        ]
    } else {
        &["static=openal", "pthread", "dl", "m", "stdc++"]
    };

    for lib in libs {
        println!("cargo:rustc-link-lib={}", lib);
    }
}
