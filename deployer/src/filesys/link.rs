//! Symlink operations on the deploy host

use std::path::{Path, PathBuf};

use crate::shell::RemoteCommand;

/// A symbolic link on the deploy host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLink {
    path: PathBuf,
}

impl RemoteLink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repoint the link at `target` in one rename
    ///
    /// The new link is created at `staging` (same directory) and moved over
    /// the old one, so the link never goes missing. `mv -T` keeps `mv` from
    /// descending into the directory the old link points at.
    pub fn swap_to(&self, target: &Path, staging: &Path) -> RemoteCommand {
        RemoteCommand::new("ln")
            .arg("-sfn")
            .path_arg(target)
            .path_arg(staging)
            .and("mv")
            .args(["-f", "-T"])
            .path_arg(staging)
            .path_arg(&self.path)
    }
}
