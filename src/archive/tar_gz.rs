use crate::cleanup::SharedCleanupContext;
use crate::runtime::{Runtime, path::is_contained_relative};
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use super::ArchiveExtractor;

/// Extractor for .tar.gz / .tgz archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        debug!("Extracting tar.gz archive to {:?}...", extract_to);

        // Unpack next to the destination first, so a single top-level
        // directory can be flattened away afterwards.
        let unpack_dir = unpack_dir_for(extract_to)?;
        if runtime.exists(&unpack_dir) {
            runtime.remove_dir_all(&unpack_dir)?;
        }
        runtime.create_dir_all(&unpack_dir)?;

        cleanup_ctx.lock().unwrap().add(unpack_dir.clone());

        let result = self
            .unpack(runtime, archive_path, &unpack_dir)
            .and_then(|_| move_package_root(runtime, &unpack_dir, extract_to));

        if let Err(e) = runtime.remove_dir_all(&unpack_dir) {
            debug!("Failed to remove {:?}: {}", unpack_dir, e);
        }
        cleanup_ctx.lock().unwrap().remove(&unpack_dir);

        result?;
        info!("Extraction complete.");
        Ok(())
    }
}

impl TarGzExtractor {
    fn unpack<R: Runtime>(&self, runtime: &R, archive_path: &Path, dest: &Path) -> Result<()> {
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let entries = archive
            .entries()
            .context("Failed to read tar.gz archive")?;

        for entry in entries {
            let mut entry = entry.context("Corrupt entry in tar.gz archive")?;
            let entry_path = entry
                .path()
                .context("Invalid path in tar.gz archive")?
                .into_owned();

            if !is_contained_relative(&entry_path) {
                bail!("Archive entry {:?} escapes the extraction directory", entry_path);
            }

            let full_path = dest.join(&entry_path);
            let entry_type = entry.header().entry_type();
            ensure_no_symlink_on_path(runtime, dest, &entry_path)?;

            match entry_type {
                EntryType::Directory => {
                    runtime.create_dir_all(&full_path)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    let target = entry
                        .link_name()
                        .context("Invalid symlink target in tar.gz archive")?
                        .ok_or_else(|| anyhow!("Symlink {:?} has no target", entry_path))?
                        .into_owned();

                    check_symlink_target(&entry_path, &target)?;

                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    runtime.symlink(&target, &full_path)?;
                }
                EntryType::XGlobalHeader | EntryType::XHeader => {}
                other => {
                    warn!("Skipping unsupported archive entry {:?} ({:?})", entry_path, other);
                }
            }
        }

        Ok(())
    }
}

/// Refuse to write `entry_path` when it, or any directory above it inside
/// `dest`, is already a symlink. Otherwise an earlier link entry could
/// redirect later entries outside `dest`.
fn ensure_no_symlink_on_path<R: Runtime>(
    runtime: &R,
    dest: &Path,
    entry_path: &Path,
) -> Result<()> {
    let mut current = dest.to_path_buf();
    for component in entry_path.components() {
        if let Component::Normal(name) = component {
            current.push(name);
            if runtime.is_symlink(&current) {
                bail!(
                    "Archive entry {:?} would be written through symlink {:?}",
                    entry_path,
                    current
                );
            }
        }
    }
    Ok(())
}

/// A link target may climb with leading `..` no higher than the extraction
/// directory, then descend by name only. The `..` steps only cross real
/// directories, so later links in the archive cannot redirect them.
fn check_symlink_target(entry_path: &Path, target: &Path) -> Result<()> {
    let outside = || {
        anyhow!(
            "Archive symlink {:?} -> {:?} points outside the extraction directory",
            entry_path,
            target
        )
    };

    let mut depth = entry_path
        .parent()
        .map(|p| {
            p.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    let mut descending = false;
    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if !descending => {
                depth = depth.checked_sub(1).ok_or_else(outside)?;
            }
            Component::Normal(_) => descending = true,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside());
            }
        }
    }
    Ok(())
}

fn unpack_dir_for(extract_to: &Path) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .ok_or_else(|| anyhow!("Invalid extraction directory {:?}", extract_to))?;
    Ok(extract_to.with_file_name(format!("{}.unpack", name.to_string_lossy())))
}

/// Move the package root (the single top-level directory, or the unpack
/// directory itself) into `extract_to`.
fn move_package_root<R: Runtime>(runtime: &R, unpack_dir: &Path, extract_to: &Path) -> Result<()> {
    let entries = runtime
        .read_dir(unpack_dir)
        .context("Failed to read unpacked archive")?;

    let source_dir = match entries.as_slice() {
        [] => bail!("Archive appears to be empty."),
        [only] if runtime.is_dir(only) && !runtime.is_symlink(only) => only.clone(),
        _ => unpack_dir.to_path_buf(),
    };

    runtime.create_dir_all(extract_to)?;
    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let name = item
            .file_name()
            .ok_or_else(|| anyhow!("Invalid entry {:?}", item))?;
        runtime.rename(&item, &extract_to.join(name))?;
    }
    Ok(())
}
