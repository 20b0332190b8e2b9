//! Target triple resolution
//!
//! Maps a (platform, architecture) pair to an LLVM-style target triple
//! (`arch-vendor-os[-env]`) plus the default compiler and linker flags for
//! it. Identifiers follow the Go naming (`darwin`, `amd64`, `arm64`); the
//! Rust spellings (`macos`, `x86_64`, `aarch64`) are accepted as aliases.
//! Unknown values pass through verbatim instead of failing.

use serde::Serialize;
use std::fmt;

/// Default optimisation level for every target
const BASE_CFLAGS: &str = "-O2";

/// A resolved compilation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Platform identifier as given (e.g. `linux`, `darwin`)
    pub platform: String,
    /// Architecture identifier as given (e.g. `amd64`, `arm64`)
    pub arch: String,
    /// Canonical triple (e.g. `x86_64-unknown-linux-gnu`)
    pub triple: String,
}

/// Compiler and linker flags derived from a triple
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BuildFlags {
    pub cflags: String,
    pub ldflags: String,
}

impl Target {
    /// Resolve a target for the given platform and architecture
    pub fn new(platform: impl Into<String>, arch: impl Into<String>) -> Self {
        let platform = platform.into();
        let arch = arch.into();
        let triple = target_triple(&platform, &arch);
        Self {
            platform,
            arch,
            triple,
        }
    }

    /// Resolve a target, falling back to the running host for unset values
    pub fn resolve(platform: Option<&str>, arch: Option<&str>) -> Self {
        let platform = platform
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| host_platform());
        let arch = arch
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| host_arch());
        Self::new(platform, arch)
    }

    /// The host's own target
    pub fn host() -> Self {
        Self::new(host_platform(), host_arch())
    }

    /// Default flags for this target
    pub fn flags(&self) -> BuildFlags {
        build_flags(&self.triple)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.triple)
    }
}

/// Platform identifier of the running host
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture identifier of the running host
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "wasm32" => "wasm",
        other => other,
    }
}

fn llvm_arch(arch: &str) -> &str {
    match arch {
        "amd64" | "x86_64" => "x86_64",
        "386" | "i386" | "i686" | "x86" => "i386",
        "arm64" | "aarch64" => "aarch64",
        "arm" => "armv7",
        "wasm" | "wasm32" => "wasm32",
        "riscv" | "riscv64" => "riscv64",
        other => other,
    }
}

/// Build the canonical triple for a platform/architecture pair
pub fn target_triple(platform: &str, arch: &str) -> String {
    // WebAssembly platforms ignore the architecture entirely
    match platform {
        "js" | "wasi" => return "wasm32-wasi".to_string(),
        "wasip1" => return "wasm32-wasip1".to_string(),
        _ => {}
    }

    let mut llvm_arch = llvm_arch(arch);
    let (vendor, os) = match platform {
        "darwin" | "macos" => {
            // macosx* rather than darwin, otherwise darwin/arm64 means iOS
            if llvm_arch == "aarch64" {
                llvm_arch = "arm64";
                ("apple", "macosx11.0.0")
            } else {
                ("apple", "macosx10.12.0")
            }
        }
        "linux" => ("unknown", "linux-gnu"),
        "windows" => ("pc", "windows-msvc"),
        other => ("unknown", other),
    };

    format!("{}-{}-{}", llvm_arch, vendor, os)
}

/// Default compiler/linker flags for a triple
pub fn build_flags(triple: &str) -> BuildFlags {
    let define = if triple.contains("wasm32") {
        Some("-D__wasm__")
    } else if triple.contains("windows") {
        Some("-D_WIN32")
    } else if triple.contains("apple") || triple.contains("darwin") {
        Some("-D__APPLE__")
    } else if triple.contains("linux") {
        Some("-D__linux__")
    } else {
        None
    };

    let cflags = match define {
        Some(define) => format!("{} {}", BASE_CFLAGS, define),
        None => BASE_CFLAGS.to_string(),
    };

    BuildFlags {
        cflags,
        ldflags: String::new(),
    }
}
