//! Platform detection and release asset naming

use std::fmt;
use std::process::Command;

use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::install::InstallerError;

/// Operating systems a Mintas release is published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

/// Archive format of a platform's release asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

/// Global cache for platform detection (initialized once, used everywhere)
static PLATFORM_CACHE: OnceCell<Platform> = OnceCell::new();

impl Platform {
    /// Detect current platform (cached after first call)
    pub fn detect() -> Result<Self, InstallerError> {
        PLATFORM_CACHE
            .get_or_try_init(|| Self::from_kernel_name(&host_kernel_name()))
            .copied()
    }

    /// Classify a kernel name as reported by `uname -s`
    pub fn from_kernel_name(kernel: &str) -> Result<Self, InstallerError> {
        let kernel = kernel.trim();
        const WINDOWS_PREFIXES: [&str; 4] = ["MINGW", "MSYS", "CYGWIN", "Windows_NT"];

        if kernel.starts_with("Linux") {
            Ok(Platform::Linux)
        } else if kernel.starts_with("Darwin") {
            Ok(Platform::MacOs)
        } else if WINDOWS_PREFIXES.iter().any(|p| kernel.starts_with(p)) {
            Ok(Platform::Windows)
        } else {
            Err(InstallerError::UnsupportedPlatform(if kernel.is_empty() {
                "<unknown>".to_string()
            } else {
                kernel.to_string()
            }))
        }
    }

    /// Name of the release asset published for this platform
    pub fn asset_filename(&self) -> &'static str {
        match self {
            Platform::Windows => "mintas-windows.zip",
            Platform::Linux => "mintas-linux.tar.gz",
            Platform::MacOs => "mintas-macos.tar.gz",
        }
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        match self {
            Platform::Windows => ArchiveKind::Zip,
            Platform::Linux | Platform::MacOs => ArchiveKind::TarGz,
        }
    }

    /// Whether the install location must be added to the user PATH
    pub fn registers_path(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
        })
    }
}

/// Kernel name of the running host
///
/// Uses `uname -s` when available (including MSYS/Cygwin shells on windows),
/// otherwise falls back to a name derived from the compile target.
pub fn host_kernel_name() -> String {
    if let Some(name) = uname_kernel_name() {
        debug!("uname reported kernel {name}");
        return name;
    }
    fallback_kernel_name(std::env::consts::OS).to_string()
}

fn uname_kernel_name() -> Option<String> {
    let uname = which::which("uname").ok()?;
    match Command::new(uname).arg("-s").output() {
        Ok(output) if output.status.success() => {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!name.is_empty()).then_some(name)
        }
        Ok(output) => {
            warn!("uname -s exited with {}", output.status);
            None
        }
        Err(e) => {
            // Unexpected: permission denied, broken PATH entry, etc.
            warn!("Failed to run uname: {e}");
            None
        }
    }
}

fn fallback_kernel_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows_NT",
        other => other,
    }
}
