use log::{debug, info};
use std::cmp::Ordering;
use std::path::PathBuf;

use crate::error::{InstallError, Result};
use crate::release::version::{compare_versions, validate_version};
use crate::runtime::Runtime;

use super::paths::InstallLayout;
use super::symlink::replace_link;

/// One version directory under `<root>/versions`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledVersion {
    pub version: String,
    pub path: PathBuf,
    /// The public link currently points into this version.
    pub current: bool,
}

/// Version the public link points at, if it points into this layout.
pub fn current_version<R: Runtime>(runtime: &R, layout: &InstallLayout) -> Option<String> {
    let link = layout.link_path();
    if !runtime.is_symlink(&link) {
        return None;
    }
    match runtime.resolve_link(&link) {
        Ok(target) => layout.version_of(&target),
        Err(e) => {
            debug!("Failed to resolve {:?}: {}", link, e);
            None
        }
    }
}

/// Installed versions, oldest first.
#[tracing::instrument(skip(runtime))]
pub fn list_installed<R: Runtime>(
    runtime: &R,
    layout: &InstallLayout,
) -> Result<Vec<InstalledVersion>> {
    let versions_dir = layout.versions_dir();
    if !runtime.is_dir(&versions_dir) {
        return Ok(Vec::new());
    }

    let current = current_version(runtime, layout);
    let mut installed: Vec<InstalledVersion> = runtime
        .read_dir(&versions_dir)?
        .into_iter()
        .filter(|path| runtime.is_dir(path))
        .filter_map(|path| {
            let version = path.file_name()?.to_string_lossy().into_owned();
            Some(InstalledVersion {
                current: current.as_deref() == Some(version.as_str()),
                version,
                path,
            })
        })
        .collect();

    installed.sort_by(|a, b| match compare_versions(&a.version, &b.version) {
        Ordering::Equal => a.version.cmp(&b.version),
        other => other,
    });
    Ok(installed)
}

/// Point the public link at an already installed version.
///
/// Returns the executable the link now resolves to.
#[tracing::instrument(skip(runtime))]
pub fn use_version<R: Runtime>(
    runtime: &R,
    layout: &InstallLayout,
    version: &str,
    force: bool,
) -> Result<PathBuf> {
    let version = validate_version(version)?;
    let version_dir = layout.version_dir(version);
    if !runtime.is_dir(&version_dir) {
        return Err(InstallError::NotInstalled {
            version: version.to_string(),
        });
    }

    let executable = InstallLayout::executable_in(&version_dir);
    let link = layout.link_path();
    replace_link(runtime, &executable, &link, &layout.versions_dir(), force)
        .map_err(|e| InstallError::symlink(&link, e))?;

    info!("{:?} -> {:?}", link, executable);
    Ok(executable)
}

/// Remove an installed version.
///
/// The version the public link points at is refused unless `force`, in
/// which case the link is removed first.
#[tracing::instrument(skip(runtime))]
pub fn uninstall<R: Runtime>(
    runtime: &R,
    layout: &InstallLayout,
    version: &str,
    force: bool,
) -> Result<()> {
    let version = validate_version(version)?;
    let version_dir = layout.version_dir(version);
    if !runtime.is_dir(&version_dir) {
        return Err(InstallError::NotInstalled {
            version: version.to_string(),
        });
    }

    let link = layout.link_path();
    if current_version(runtime, layout).as_deref() == Some(version) {
        if !force {
            return Err(InstallError::InUse {
                version: version.to_string(),
                link,
            });
        }
        debug!("Removing link {:?}", link);
        runtime
            .remove_symlink(&link)
            .map_err(|e| InstallError::symlink(&link, e))?;
    }

    runtime.remove_dir_all(&version_dir)?;
    info!("Removed {:?}", version_dir);
    Ok(())
}
