//! Release descriptors: what to download for a (version, platform) pair.
//!
//! # Structure
//!
//! - `digest` - validated SHA-256 digest newtype
//! - `table` - immutable descriptor table with lookup and latest-version selection
//! - `manifest` - JSON manifest that can replace the built-in table
//! - `version` - version normalization and ordering

mod digest;
mod manifest;
mod table;
pub mod version;

pub use digest::Sha256Digest;
pub use manifest::{ManifestEntry, load_manifest, parse_manifest};
pub use table::{DEFAULT_BASE_URL, ReleaseDescriptor, ReleaseTable, artifact_url};
