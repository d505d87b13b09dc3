//! Deploy directory layout

use std::path::{Path, PathBuf};

use crate::deploy::release::ReleaseId;
use crate::models::deployment::DeploymentConfig;

pub const REPO_DIR: &str = "repo";
pub const RELEASES_DIR: &str = "releases";
pub const CURRENT_LINK: &str = "current";
pub const AUDIT_LOG: &str = "revisions.log";

/// Paths used by one deploy run
///
/// ```text
/// <deployDir>/repo/
/// <deployDir>/releases/<releaseId>/
/// <deployDir>/current -> releases/<releaseId>
/// <deployDir>/revisions.log
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    deploy_dir: PathBuf,
    release_id: ReleaseId,
}

impl PathLayout {
    pub fn new(deploy_dir: impl Into<PathBuf>, release_id: ReleaseId) -> Self {
        Self {
            deploy_dir: deploy_dir.into(),
            release_id,
        }
    }

    pub fn resolve(config: &DeploymentConfig, release_id: ReleaseId) -> Self {
        Self::new(config.deploy_dir(), release_id)
    }

    pub fn deploy_dir(&self) -> &Path {
        &self.deploy_dir
    }

    pub fn release_id(&self) -> &ReleaseId {
        &self.release_id
    }

    /// Shared checkout
    pub fn repo_dir(&self) -> PathBuf {
        self.deploy_dir.join(REPO_DIR)
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.deploy_dir.join(RELEASES_DIR)
    }

    /// This run's release
    pub fn release_dir(&self) -> PathBuf {
        self.releases_dir().join(self.release_id.as_str())
    }

    pub fn current_link(&self) -> PathBuf {
        self.deploy_dir.join(CURRENT_LINK)
    }

    /// Symlink target, relative to the deploy directory
    pub fn current_target(&self) -> PathBuf {
        Path::new(RELEASES_DIR).join(self.release_id.as_str())
    }

    /// Where the new link is built before being renamed over `current`
    pub fn staging_link(&self) -> PathBuf {
        self.deploy_dir
            .join(format!(".{}-{}", CURRENT_LINK, self.release_id))
    }

    pub fn log_path(&self) -> PathBuf {
        self.deploy_dir.join(AUDIT_LOG)
    }
}
