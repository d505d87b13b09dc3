//! Deploy run options

use std::time::Duration;

use crate::deploy::retention::DEFAULT_KEEP;
use crate::storage::settings::Settings;
use crate::utils::{invoking_user, sanitize_word};

/// Knobs for one deploy run that are not part of the target's config
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Upper bound for each remote command
    pub stage_timeout: Duration,

    /// Releases kept after a successful deploy
    pub keep_releases: usize,

    /// Identity written to the audit log
    pub user: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(600), // 10 minutes
            keep_releases: DEFAULT_KEEP,
            user: invoking_user(),
        }
    }
}

impl DeployOptions {
    pub fn with_user(mut self, user: &str) -> Self {
        let user = sanitize_word(user);
        if !user.is_empty() {
            self.user = user;
        }
        self
    }
}

impl From<&Settings> for DeployOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            stage_timeout: settings.stage_timeout(),
            keep_releases: settings.keep_releases,
            ..Default::default()
        }
    }
}
