//! Error taxonomy for installer operations.
//!
//! Every variant is fatal to the operation that raised it. Internal helpers
//! work with `anyhow::Result`; the public operations on
//! [`Installer`](crate::install::Installer) map failures into one of these
//! variants so callers can tell an integrity failure from a network one.

use std::path::PathBuf;

use thiserror::Error;

use crate::platform::Platform;
use crate::release::Sha256Digest;

pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum InstallError {
    /// The running OS/architecture has no release artifact.
    #[error("unsupported platform {os}-{arch}: no superqode release is published for it")]
    UnsupportedPlatform { os: String, arch: String },

    /// A version string that cannot name a directory under `versions/`.
    #[error("invalid version {version:?}: expected a release name such as 0.1.5")]
    InvalidVersion { version: String },

    #[error("unknown version {version} for {platform}")]
    UnknownVersion { version: String, platform: Platform },

    /// Transport failure, non-success HTTP status or timeout.
    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("integrity check failed for {url}: expected sha256 {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: Sha256Digest,
        actual: String,
    },

    #[error("failed to extract {}", archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to link {}", link.display())]
    Symlink {
        link: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The installed executable did not answer `--version` as expected.
    #[error("verification of {} failed: {reason}", executable.display())]
    Verification { executable: PathBuf, reason: String },

    #[error("invalid sha256 digest: {reason}")]
    InvalidDigest { reason: String },

    #[error("invalid release table: {reason}")]
    InvalidManifest { reason: String },

    #[error("superqode {version} is not installed")]
    NotInstalled { version: String },

    #[error("superqode {version} is linked from {}; pass --force to remove it", link.display())]
    InUse { version: String, link: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InstallError {
    pub(crate) fn download(url: &str, source: anyhow::Error) -> Self {
        Self::Download {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn extraction(archive: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Extraction {
            archive: archive.into(),
            source,
        }
    }

    pub(crate) fn symlink(link: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Symlink {
            link: link.into(),
            source,
        }
    }
}
