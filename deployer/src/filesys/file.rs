//! File operations on the deploy host

use std::path::{Path, PathBuf};

use crate::shell::RemoteCommand;

/// A regular file on the deploy host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    path: PathBuf,
}

impl RemoteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` plus a newline, creating the file if needed
    pub fn append_line(&self, line: &str) -> RemoteCommand {
        RemoteCommand::new("printf")
            .args(["%s\\n", line])
            .append_to(&self.path)
    }
}
