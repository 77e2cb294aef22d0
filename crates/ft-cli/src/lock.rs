//! Single-instance guard for the control loop.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fs2::FileExt;

use crate::config;

/// Returns the lock file shared by every `ft watch` of this user.
pub fn lock_path() -> PathBuf {
    config::dirs_config_path()
        .unwrap_or_else(std::env::temp_dir)
        .join("watch.lock")
}

/// Exclusive lock held while the control loop runs. Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
}

impl InstanceLock {
    /// Takes the lock at `path`, failing at once if another process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(path).context("failed to create lock file")?;
        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                bail!("ft watch is already running (lock held on {})", path.display());
            }
            return Err(err).context("failed to acquire lock");
        }
        tracing::debug!(path = %path.display(), "acquired instance lock");
        Ok(Self { _file: file })
    }
}
