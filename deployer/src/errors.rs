//! Error types for reldeploy

use std::time::Duration;

use thiserror::Error;

use crate::deploy::fsm::Stage;
use crate::models::deployment::SyncMode;

/// A command that never produced a usable exit status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("failed to issue command: {0}")]
    Spawn(String),

    #[error("command ended without an exit status")]
    Disconnected,

    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures of the retention sub-stage
#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Failed to list contents of releases directory (exit code {exit_code})")]
    List { exit_code: i32 },

    #[error("Failed to remove old release directory {entry} (exit code {exit_code})")]
    Remove { entry: String, exit_code: i32 },

    #[error("Retention command failed: {0}")]
    Exec(#[from] ExecError),
}

impl RetentionError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RetentionError::List { exit_code } | RetentionError::Remove { exit_code, .. } => {
                Some(*exit_code)
            }
            RetentionError::Exec(_) => None,
        }
    }
}

/// Main error type for a deploy run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to create deployment directory structure (exit code {exit_code})")]
    LayoutError { exit_code: i32 },

    #[error("Failed to {mode} Git repository (exit code {exit_code})")]
    SyncError { mode: SyncMode, exit_code: i32 },

    #[error("Failed to extract revision {revision} from Git repository (exit code {exit_code})")]
    ExtractError { revision: String, exit_code: i32 },

    #[error("Failed to symlink current release (exit code {exit_code})")]
    SymlinkError { exit_code: i32 },

    #[error("Failed to write to audit log: {reason} (exit code {exit_code})")]
    AuditError { reason: String, exit_code: i32 },

    #[error("{stage} stage could not run: {source}")]
    ExecutorError {
        stage: Stage,
        #[source]
        source: ExecError,
    },

    #[error("Deploy target is locked by another run: {0}")]
    Locked(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DeployError {
    /// The pipeline stage this error aborted, if it came from one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DeployError::LayoutError { .. } => Some(Stage::EnsureLayout),
            DeployError::SyncError { .. } => Some(Stage::SyncRepository),
            DeployError::ExtractError { .. } => Some(Stage::ExtractRevision),
            DeployError::SymlinkError { .. } => Some(Stage::SwapCurrent),
            DeployError::AuditError { .. } => Some(Stage::AppendAudit),
            DeployError::ExecutorError { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The remote exit code behind this error, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            DeployError::LayoutError { exit_code }
            | DeployError::SyncError { exit_code, .. }
            | DeployError::ExtractError { exit_code, .. }
            | DeployError::SymlinkError { exit_code }
            | DeployError::AuditError { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
