//! Command line arguments
//!
//! Arguments use a flat `--key=value` form; bare `--flag` is stored as
//! `"true"`. Values given here override the config and settings files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::DeployError;
use crate::models::deployment::DeploymentConfig;
use crate::storage::settings::{Settings, SshSettings};

pub const USAGE: &str = "\
Usage: reldeploy [--config=<deploy.json>] [--settings=<settings.json>]
                 [--name=<app>] [--repo=<git url>] [--revision=<ref>] [--deploy-dir=<path>]
                 [--host=<ssh host>] [--user=<ssh user>] [--port=<ssh port>]
                 [--keep=<n>] [--timeout=<secs>] [--audit-user=<name>]
                 [--log-level=<level>] [--log-dir=<path>] [--json-logs] [--lock-dir=<path>]
       reldeploy --version";

#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    values: HashMap<String, String>,
}

impl CliArgs {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            if let Some((key, value)) = arg.split_once('=') {
                let clean_key = key.trim_start_matches('-');
                values.insert(clean_key.to_string(), value.to_string());
            } else if arg.starts_with("--") {
                let clean_key = arg.trim_start_matches('-');
                values.insert(clean_key.to_string(), "true".to_string());
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1") | Some("yes"))
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, DeployError> {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| DeployError::ConfigError(format!("invalid --{}: {:?}", key, raw))),
            None => Ok(None),
        }
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.get("config").map(PathBuf::from)
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        self.get("settings").map(PathBuf::from)
    }

    /// Identity recorded in the audit log instead of `$USER`
    pub fn audit_user(&self) -> Option<&str> {
        self.get("audit-user")
    }

    /// Merge deployment overrides onto an optional base config
    pub fn deployment_config(
        &self,
        base: Option<DeploymentConfig>,
    ) -> Result<DeploymentConfig, DeployError> {
        let mut config = match base {
            Some(config) => config,
            None => {
                let name = self.get("name").ok_or_else(|| {
                    DeployError::ConfigError("--name is required without --config".to_string())
                })?;
                let repository = self
                    .get("repo")
                    .or_else(|| self.get("repository"))
                    .ok_or_else(|| {
                        DeployError::ConfigError("--repo is required without --config".to_string())
                    })?;
                DeploymentConfig::new(name, repository)
            }
        };

        if let Some(name) = self.get("name") {
            config.name = name.to_string();
        }
        if let Some(repository) = self.get("repo").or_else(|| self.get("repository")) {
            config.repository = repository.to_string();
        }
        if let Some(revision) = self.get("revision") {
            config.revision = revision.to_string();
        }
        if let Some(dir) = self.get("deploy-dir").or_else(|| self.get("deployDir")) {
            config.deploy_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides to loaded settings
    pub fn apply_settings(&self, mut settings: Settings) -> Result<Settings, DeployError> {
        if let Some(level) = self.get("log-level") {
            settings.log_level = level.parse().map_err(DeployError::ConfigError)?;
        }
        if self.flag("json-logs") {
            settings.json_logs = true;
        }
        if let Some(dir) = self.get("log-dir") {
            settings.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(keep) = self.parsed::<usize>("keep")? {
            settings.keep_releases = keep;
        }
        if let Some(timeout) = self.parsed::<u64>("timeout")? {
            settings.stage_timeout_secs = timeout;
        }
        if let Some(dir) = self.get("lock-dir") {
            settings.lock_dir = PathBuf::from(dir);
        }

        if let Some(host) = self.get("host") {
            let ssh = settings
                .ssh
                .get_or_insert_with(|| SshSettings::new(host));
            ssh.host = host.to_string();
        }
        if let Some(ssh) = settings.ssh.as_mut() {
            if let Some(user) = self.get("user") {
                ssh.user = Some(user.to_string());
            }
            if let Some(port) = self.parsed::<u16>("port")? {
                ssh.port = port;
            }
        }

        settings.validate()?;
        Ok(settings)
    }
}
