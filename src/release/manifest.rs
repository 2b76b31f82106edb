//! JSON release manifest that replaces the built-in table (mirrors, offline testing).
//!
//! ```json
//! [
//!   { "version": "0.1.5", "platform": "linux-arm64", "sha256": "8b8e…acd" },
//!   { "version": "0.1.5", "platform": "macos-arm64", "sha256": "…", "url": "https://mirror/x.tar.gz" }
//! ]
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use super::digest::Sha256Digest;
use super::table::{ReleaseDescriptor, ReleaseTable, artifact_url};
use crate::error::{InstallError, Result};
use crate::platform::Platform;
use crate::runtime::Runtime;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub version: String,
    pub platform: Platform,
    pub sha256: Sha256Digest,
    /// Explicit URL; derived from the base URL when absent.
    #[serde(default)]
    pub url: Option<String>,
}

/// Parse manifest JSON into a table.
pub fn parse_manifest(json: &str, base_url: &str) -> Result<ReleaseTable> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(json).map_err(|e| InstallError::InvalidManifest {
            reason: e.to_string(),
        })?;

    let descriptors = entries
        .into_iter()
        .map(|e| ReleaseDescriptor {
            url: e
                .url
                .unwrap_or_else(|| artifact_url(base_url, &e.version, e.platform)),
            version: e.version,
            platform: e.platform,
            sha256: e.sha256,
        })
        .collect();

    ReleaseTable::new(descriptors)
}

/// Load a manifest file through the runtime.
#[tracing::instrument(skip(runtime))]
pub fn load_manifest<R: Runtime>(runtime: &R, path: &Path, base_url: &str) -> Result<ReleaseTable> {
    let json = runtime
        .read_to_string(path)
        .with_context(|| format!("Failed to read release manifest {:?}", path))?;
    parse_manifest(&json, base_url)
}
