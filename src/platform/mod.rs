//! Platform detection and platform keys
//!
//! This module provides the [`Platform`] key used to index the release
//! table and the detection seam that reports the running OS and CPU
//! architecture.

mod detection;

pub use detection::{DefaultPlatformDetector, HostInfo, PlatformDetector};

#[cfg(test)]
pub use detection::MockPlatformDetector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system and CPU architecture pair that a release artifact is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    MacosArm64,
    MacosX86_64,
    LinuxArm64,
    LinuxX86_64,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::MacosArm64,
        Platform::MacosX86_64,
        Platform::LinuxArm64,
        Platform::LinuxX86_64,
    ];

    /// OS component as it appears in artifact names.
    pub fn os(&self) -> &'static str {
        match self {
            Platform::MacosArm64 | Platform::MacosX86_64 => "macos",
            Platform::LinuxArm64 | Platform::LinuxX86_64 => "linux",
        }
    }

    /// Architecture component as it appears in artifact names.
    pub fn arch(&self) -> &'static str {
        match self {
            Platform::MacosArm64 | Platform::LinuxArm64 => "arm64",
            Platform::MacosX86_64 | Platform::LinuxX86_64 => "x86_64",
        }
    }

    /// Map a detected host to a platform key.
    ///
    /// Accepts both Rust target names (`aarch64`, `x86_64`) and the
    /// release naming (`arm64`, `amd64`).
    pub fn from_host(host: &HostInfo) -> Option<Self> {
        let os = host.os.to_lowercase();
        let arch = host.arch.to_lowercase();

        let arm = matches!(arch.as_str(), "aarch64" | "arm64");
        let x64 = matches!(arch.as_str(), "x86_64" | "amd64" | "x64");

        match os.as_str() {
            "macos" | "darwin" if arm => Some(Platform::MacosArm64),
            "macos" | "darwin" if x64 => Some(Platform::MacosX86_64),
            "linux" if arm => Some(Platform::LinuxArm64),
            "linux" if x64 => Some(Platform::LinuxX86_64),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os(), self.arch())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid platform '{}', expected <os>-<arch>", s))?;
        Platform::from_host(&HostInfo {
            os: os.to_string(),
            arch: arch.to_string(),
        })
        .ok_or_else(|| format!("unknown platform '{}'", s))
    }
}

impl TryFrom<String> for Platform {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.to_string()
    }
}
