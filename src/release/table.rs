use log::debug;
use serde::Serialize;
use std::collections::HashSet;

use super::digest::Sha256Digest;
use super::version::{compare_versions, normalize_version, validate_version};
use crate::error::{InstallError, Result};
use crate::platform::Platform;

/// Where published superqode release assets live.
pub const DEFAULT_BASE_URL: &str = "https://github.com/SuperagenticAI/superqode/releases/download";

/// Digests pinned at release time, one row per published artifact.
const BUILTIN_RELEASES: &[(&str, Platform, &str)] = &[
    (
        "0.1.4",
        Platform::MacosArm64,
        "dc436564fdf0f5aa6f7436c454a784eb5b923ea2997ebdcc28ea5fad86c8ce12",
    ),
    (
        "0.1.4",
        Platform::LinuxArm64,
        "34234bc26d8842a50c16b9ac7b1827367e9c73d5bc229a043dabc6c52c57e8f0",
    ),
    (
        "0.1.5",
        Platform::LinuxArm64,
        "8b8e21619030b83f09eda6cd7d6b8f48267eab35777e64c3c7a97003a4816acd",
    ),
];

/// Static record mapping a (version, platform) pair to a URL and a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDescriptor {
    pub version: String,
    pub platform: Platform,
    pub url: String,
    pub sha256: Sha256Digest,
}

impl ReleaseDescriptor {
    /// File name of the artifact, taken from the last URL segment.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// Build the artifact URL for a version and platform under `base_url`.
///
/// `<base>/v<version>/superqode-<version>-<os>-<arch>.tar.gz`
pub fn artifact_url(base_url: &str, version: &str, platform: Platform) -> String {
    let version = normalize_version(version);
    format!(
        "{}/v{}/superqode-{}-{}-{}.tar.gz",
        base_url.trim_end_matches('/'),
        version,
        version,
        platform.os(),
        platform.arch()
    )
}

/// Immutable set of release descriptors.
#[derive(Debug, Clone)]
pub struct ReleaseTable {
    descriptors: Vec<ReleaseDescriptor>,
}

impl ReleaseTable {
    /// Build a table, rejecting unusable versions and duplicate (version, platform) pairs.
    pub fn new(descriptors: Vec<ReleaseDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            let version = validate_version(&d.version).map_err(|e| {
                InstallError::InvalidManifest {
                    reason: e.to_string(),
                }
            })?;
            let key = (version.to_string(), d.platform);
            if !seen.insert(key) {
                return Err(InstallError::InvalidManifest {
                    reason: format!("duplicate release {} for {}", d.version, d.platform),
                });
            }
        }
        Ok(Self { descriptors })
    }

    /// The table compiled into this binary, with URLs under `base_url`.
    pub fn builtin(base_url: &str) -> Self {
        let descriptors = BUILTIN_RELEASES
            .iter()
            .map(|(version, platform, sha)| ReleaseDescriptor {
                version: version.to_string(),
                platform: *platform,
                url: artifact_url(base_url, version, *platform),
                sha256: Sha256Digest::try_from(*sha).expect("built-in digests are valid"),
            })
            .collect();
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[ReleaseDescriptor] {
        &self.descriptors
    }

    /// Whether any artifact is published for `platform`.
    pub fn supports(&self, platform: Platform) -> bool {
        self.descriptors.iter().any(|d| d.platform == platform)
    }

    /// Descriptors for `platform`, newest first.
    pub fn for_platform(&self, platform: Platform) -> Vec<&ReleaseDescriptor> {
        let mut matching: Vec<_> = self
            .descriptors
            .iter()
            .filter(|d| d.platform == platform)
            .collect();
        matching.sort_by(|a, b| compare_versions(&b.version, &a.version));
        matching
    }

    /// Look up the descriptor for an exact version.
    pub fn lookup(&self, version: &str, platform: Platform) -> Result<&ReleaseDescriptor> {
        let wanted = validate_version(version)?;
        debug!("Looking up release {} for {}", wanted, platform);
        self.descriptors
            .iter()
            .find(|d| d.platform == platform && normalize_version(&d.version) == wanted)
            .ok_or_else(|| InstallError::UnknownVersion {
                version: wanted.to_string(),
                platform,
            })
    }

    /// Newest descriptor published for `platform`.
    pub fn latest(&self, platform: Platform) -> Result<&ReleaseDescriptor> {
        self.for_platform(platform)
            .into_iter()
            .next()
            .ok_or_else(|| InstallError::UnknownVersion {
                version: "latest".to_string(),
                platform,
            })
    }

    /// Resolve an optional requested version; `None` or "latest" picks the newest.
    pub fn select(&self, version: Option<&str>, platform: Platform) -> Result<&ReleaseDescriptor> {
        match version {
            None => self.latest(platform),
            Some(v) if v.eq_ignore_ascii_case("latest") => self.latest(platform),
            Some(v) => self.lookup(v, platform),
        }
    }
}
