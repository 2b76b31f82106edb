//! Removal of partial install state.
//!
//! Staging archives and directories are registered here while an install is
//! in flight. A failed install or a Ctrl-C removes whatever is still
//! registered, so nothing half-written outlives the process. A version
//! directory moved aside during a forced reinstall is registered as a
//! restore: it goes back into place unless its replacement arrived.

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tracks staging paths that must be removed if the install does not finish
#[derive(Debug, Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
    /// (backup, original) pairs
    restores: Vec<(PathBuf, PathBuf)>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Forget a path (it was moved into place or already removed)
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// `original` was moved to `backup`; move it back on cleanup if
    /// `original` is still missing by then, otherwise drop the backup.
    pub fn add_restore(&mut self, backup: PathBuf, original: PathBuf) {
        self.restores.push((backup, original));
    }

    pub fn remove_restore(&mut self, backup: &Path) {
        self.restores.retain(|(b, _)| b != backup);
    }

    /// Remove every registered path, newest first, and forget them
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..).rev() {
            debug!("Cleaning up: {:?}", path);
            let result = match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
                Err(_) => continue,
            };
            if let Err(e) = result {
                debug!("Failed to clean up {:?}: {}", path, e);
            }
        }

        for (backup, original) in self.restores.drain(..).rev() {
            let result = if std::fs::symlink_metadata(&original).is_err() {
                debug!("Restoring {:?} from {:?}", original, backup);
                std::fs::rename(&backup, &original)
            } else {
                debug!("Removing backup {:?}", backup);
                std::fs::remove_dir_all(&backup)
            };
            if let Err(e) = result {
                debug!("Failed to restore {:?}: {}", original, e);
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Registers a path for the lifetime of one install step
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        ctx.lock().unwrap().add(path.clone());
        Self { ctx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The step succeeded: the path is kept.
    pub fn success(self) {
        self.ctx.lock().unwrap().remove(&self.path);
    }
}
