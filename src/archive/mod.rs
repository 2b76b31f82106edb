mod tar_gz;

use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::Result;
use std::path::Path;

pub use tar_gz::TarGzExtractor;

/// Trait for format-specific archive extractors
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, registering intermediate
    /// directories for interruption cleanup.
    ///
    /// When the archive holds a single top-level directory, that directory's
    /// contents land directly in `extract_to`.
    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()>;
}
