//! Directory operations on the deploy host

use std::path::{Path, PathBuf};

use crate::shell::RemoteCommand;

/// A directory on the deploy host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDir {
    path: PathBuf,
}

impl RemoteDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An entry inside this directory
    pub fn join(&self, name: &str) -> RemoteDir {
        RemoteDir::new(self.path.join(name))
    }

    /// `mkdir -p` every directory; succeeds when they already exist
    pub fn create_all<'a, I>(dirs: I) -> RemoteCommand
    where
        I: IntoIterator<Item = &'a RemoteDir>,
    {
        dirs.into_iter()
            .fold(RemoteCommand::new("mkdir").args(["-p", "--"]), |cmd, dir| {
                cmd.path_arg(dir.path())
            })
    }

    /// Entry names, most recently modified first
    ///
    /// A missing directory lists as empty and still exits 0.
    pub fn list_by_mtime(&self) -> RemoteCommand {
        RemoteCommand::new("test")
            .args(["!", "-d"])
            .path_arg(&self.path)
            .or("ls")
            .arg("-1At")
            .path_arg(&self.path)
    }

    /// Delete the directory and all contents
    pub fn remove(&self) -> RemoteCommand {
        RemoteCommand::new("rm").args(["-rf", "--"]).path_arg(&self.path)
    }
}
