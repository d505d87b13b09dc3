//! Per-target advisory lock
//!
//! The pipeline assumes a single run per deploy directory. Runs started from
//! this machine serialize on an exclusive lock file keyed by host and
//! deploy directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::errors::DeployError;
use crate::utils::sha256_hash;

/// Held for the duration of one deploy run; released on drop
#[derive(Debug)]
pub struct TargetLock {
    file: fs::File,
    path: PathBuf,
}

impl TargetLock {
    /// Take the lock for `target` without waiting
    pub fn acquire(lock_dir: &Path, target: &str) -> Result<Self, DeployError> {
        fs::create_dir_all(lock_dir)?;
        let path = Self::path_for(lock_dir, target);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(DeployError::Locked(target.to_string()));
            }
            return Err(DeployError::IoError(e));
        }

        file.set_len(0)?;
        writeln!(file, "{} pid={}", target, std::process::id())?;
        debug!("Acquired deploy lock {}", path.display());

        Ok(Self { file, path })
    }

    pub fn path_for(lock_dir: &Path, target: &str) -> PathBuf {
        lock_dir.join(format!("{}.lock", sha256_hash(target.as_bytes())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released deploy lock {}", self.path.display());
    }
}
