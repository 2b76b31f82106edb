use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, normalize_path};

/// Name of the executable inside a package root, and of the public link.
pub const EXECUTABLE_NAME: &str = "superqode";

/// Filesystem layout of one installation root.
///
/// ```text
/// <root>/versions/<version>/superqode   extracted package root per version
/// <root>/tmp/                           staging, removed after each install
/// <bin>/superqode -> <root>/versions/<version>/superqode
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bin_dir: bin_dir.into(),
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// The public entry point on the search path.
    pub fn link_path(&self) -> PathBuf {
        self.bin_dir.join(EXECUTABLE_NAME)
    }

    pub fn executable_in(dir: &Path) -> PathBuf {
        dir.join(EXECUTABLE_NAME)
    }

    /// Version name of a path under `versions/`, e.g. `.../versions/0.1.5/superqode` -> `0.1.5`.
    pub fn version_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(self.versions_dir()).ok()?;
        relative
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
    }
}

/// Resolve the installation layout from explicit paths or defaults.
///
/// Relative paths are taken from the working directory, so link targets
/// are always absolute.
#[tracing::instrument(skip(runtime))]
pub fn resolve_layout<R: Runtime>(
    runtime: &R,
    root: Option<PathBuf>,
    bin_dir: Option<PathBuf>,
) -> Result<InstallLayout> {
    let root = match root {
        Some(path) => absolute(runtime, path)?,
        None => default_install_root(runtime)?,
    };
    let bin_dir = match bin_dir {
        Some(path) => absolute(runtime, path)?,
        None => default_bin_dir(runtime)?,
    };

    info!("Using install root: {}", root.display());
    Ok(InstallLayout::new(root, bin_dir))
}

fn absolute<R: Runtime>(runtime: &R, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(normalize_path(&runtime.current_dir()?.join(path)))
}

/// Get the default installation root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".superqode"))
    }
}

/// Get the default directory for the public `superqode` link
#[tracing::instrument(skip(runtime))]
pub fn default_bin_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(PathBuf::from("/usr/local/bin"))
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".local").join("bin"))
    }
}

#[cfg(target_os = "macos")]
fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/superqode")
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\superqode")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/superqode")
}
