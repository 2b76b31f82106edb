use anyhow::{Context, Result, bail};
use log::debug;
use std::path::Path;

use crate::runtime::{Runtime, is_path_under};

/// Point `link` at `target`, replacing any previous link atomically.
///
/// A temporary link is created next to `link` and renamed over it, so
/// `link` always resolves to either the old or the new target. An existing
/// link that points outside `owned_dir` belongs to someone else and is only
/// replaced when `force` is set. Returns `false` when the link already
/// pointed at `target`.
#[tracing::instrument(skip(runtime))]
pub fn replace_link<R: Runtime>(
    runtime: &R,
    target: &Path,
    link: &Path,
    owned_dir: &Path,
    force: bool,
) -> Result<bool> {
    if runtime.is_symlink(link) {
        match runtime.resolve_link(link) {
            Ok(existing) if existing == target => {
                debug!("{:?} already points to {:?}", link, target);
                return Ok(false);
            }
            Ok(existing) if !force && !is_path_under(&existing, owned_dir) => {
                bail!(
                    "{:?} points to {:?}, which was not installed by superqode-installer; pass --force to replace it",
                    link,
                    existing
                );
            }
            Ok(existing) => debug!("Replacing link {:?} -> {:?}", link, existing),
            Err(e) => debug!("{:?} is unreadable ({}), replacing", link, e),
        }
    } else if runtime.exists(link) {
        bail!("{:?} already exists and is not a symlink", link);
    }

    let parent = link
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid link path {:?}", link))?;
    if !runtime.exists(parent) {
        runtime.create_dir_all(parent)?;
    }

    let file_name = link
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid link path {:?}", link))?;
    let staged = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));
    if runtime.is_symlink(&staged) {
        runtime.remove_symlink(&staged)?;
    }

    runtime
        .symlink(target, &staged)
        .with_context(|| format!("Failed to create link to {:?}", target))?;

    if let Err(e) = runtime.rename(&staged, link) {
        if let Err(cleanup) = runtime.remove_symlink(&staged) {
            debug!("Failed to remove staged link {:?}: {}", staged, cleanup);
        }
        return Err(e).with_context(|| format!("Failed to replace {:?}", link));
    }

    Ok(true)
}
