//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::retention::DEFAULT_KEEP;
use crate::errors::DeployError;
use crate::logs::LogLevel;
use crate::utils::read_json;

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Also write logs to a daily rolling file in this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Deploy over ssh; absent means the local machine
    #[serde(default)]
    pub ssh: Option<SshSettings>,

    /// Upper bound for each remote command, in seconds
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Number of releases kept after a deploy
    #[serde(default = "default_keep_releases")]
    pub keep_releases: usize,

    /// Directory holding per-target lock files
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
}

fn default_stage_timeout() -> u64 {
    600
}

fn default_keep_releases() -> usize {
    DEFAULT_KEEP
}

fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join("reldeploy-locks")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            ssh: None,
            stage_timeout_secs: default_stage_timeout(),
            keep_releases: default_keep_releases(),
            lock_dir: default_lock_dir(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let settings: Settings = read_json(path).await?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), DeployError> {
        if self.stage_timeout_secs == 0 {
            return Err(DeployError::ConfigError(
                "stage_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.keep_releases == 0 {
            return Err(DeployError::ConfigError(
                "keep_releases must be at least 1".to_string(),
            ));
        }
        if let Some(ssh) = &self.ssh {
            if ssh.host.trim().is_empty() {
                return Err(DeployError::ConfigError("ssh.host is required".to_string()));
            }
        }
        Ok(())
    }
}

/// SSH target settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Host name or ssh config alias
    pub host: String,

    /// Login user; ssh's own default when absent
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl SshSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
