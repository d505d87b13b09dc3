//! Deployment models

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::deploy::release::ReleaseId;
use crate::errors::{DeployError, RetentionError};

/// Root under which targets live when `deployDir` is not given
pub const DEFAULT_DEPLOY_ROOT: &str = "/opt";

/// Revision deployed when none is requested
pub const DEFAULT_REVISION: &str = "origin/master";

/// What to deploy and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Target application name
    pub name: String,

    /// Git source (URL or path)
    #[serde(alias = "repo")]
    pub repository: String,

    /// Any git-resolvable ref
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Root of the target's layout
    #[serde(
        default,
        rename = "deployDir",
        alias = "deploy_dir",
        skip_serializing_if = "Option::is_none"
    )]
    pub deploy_dir: Option<PathBuf>,
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

impl DeploymentConfig {
    pub fn new(name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: repository.into(),
            revision: default_revision(),
            deploy_dir: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_deploy_dir(mut self, deploy_dir: impl Into<PathBuf>) -> Self {
        self.deploy_dir = Some(deploy_dir.into());
        self
    }

    /// Effective deploy directory (`/opt/<name>` by default)
    pub fn deploy_dir(&self) -> PathBuf {
        match &self.deploy_dir {
            Some(dir) => dir.clone(),
            None => Path::new(DEFAULT_DEPLOY_ROOT).join(&self.name),
        }
    }

    /// Reject values that would break the layout or the audit log format
    pub fn validate(&self) -> Result<(), DeployError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DeployError::ConfigError("name is required".to_string()));
        }
        if name != self.name || self.name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DeployError::ConfigError(format!(
                "name must be a single path component: {:?}",
                self.name
            )));
        }

        require_word("repository", &self.repository)?;
        require_word("revision", &self.revision)?;
        if self.revision.starts_with('-') {
            return Err(DeployError::ConfigError(format!(
                "revision must not start with '-': {:?}",
                self.revision
            )));
        }

        if let Some(dir) = &self.deploy_dir {
            if dir.as_os_str().is_empty() {
                return Err(DeployError::ConfigError("deployDir must not be empty".to_string()));
            }
        }

        Ok(())
    }
}

/// Audit log fields are space separated, so they must be single words
fn require_word(field: &str, value: &str) -> Result<(), DeployError> {
    if value.is_empty() {
        return Err(DeployError::ConfigError(format!("{} is required", field)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(DeployError::ConfigError(format!(
            "{} must not contain whitespace: {:?}",
            field, value
        )));
    }
    Ok(())
}

/// How the shared checkout was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Clone,
    Fetch,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Clone => f.write_str("clone"),
            SyncMode::Fetch => f.write_str("fetch"),
        }
    }
}

/// Result of the cleanup that runs after the release is live
#[derive(Debug)]
pub enum RetentionOutcome {
    /// Retention ran; `removed` lists the evicted release names
    Pruned { removed: Vec<String> },

    /// Retention failed; the deploy itself is still live
    Failed(RetentionError),
}

impl RetentionOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RetentionOutcome::Pruned { .. })
    }
}

/// A deploy whose new release is live
#[derive(Debug)]
pub struct DeployOutcome {
    pub release_id: ReleaseId,
    pub release_dir: PathBuf,
    pub sync_mode: SyncMode,
    pub commit: String,
    pub retention: RetentionOutcome,
}

impl DeployOutcome {
    /// Deployed and cleaned up
    pub fn is_clean(&self) -> bool {
        self.retention.is_ok()
    }
}
