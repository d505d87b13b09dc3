//! Deploy entry point used by the binary

use std::sync::Arc;

use tracing::info;

use crate::app::options::DeployOptions;
use crate::deploy::executor::{LocalExecutor, RemoteExecutor, SshExecutor};
use crate::deploy::pipeline::Deployer;
use crate::errors::DeployError;
use crate::models::deployment::{DeployOutcome, DeploymentConfig};
use crate::storage::lock::TargetLock;
use crate::storage::settings::Settings;

/// Pick the executor the settings describe
pub fn build_executor(settings: &Settings) -> Arc<dyn RemoteExecutor> {
    match &settings.ssh {
        Some(ssh) => Arc::new(SshExecutor::from_settings(ssh)),
        None => Arc::new(LocalExecutor::new()),
    }
}

/// Lock key for one deploy directory on one host
pub fn target_key(executor: &dyn RemoteExecutor, config: &DeploymentConfig) -> String {
    format!("{}:{}", executor.target(), config.deploy_dir().display())
}

/// Validate, lock the target, and deploy
pub async fn run(
    config: &DeploymentConfig,
    settings: &Settings,
    options: DeployOptions,
) -> Result<DeployOutcome, DeployError> {
    config.validate()?;
    settings.validate()?;

    let executor = build_executor(settings);
    run_with_executor(config, settings, options, executor).await
}

/// Same as [`run`] with a caller-supplied executor
pub async fn run_with_executor(
    config: &DeploymentConfig,
    settings: &Settings,
    options: DeployOptions,
    executor: Arc<dyn RemoteExecutor>,
) -> Result<DeployOutcome, DeployError> {
    let target = target_key(executor.as_ref(), config);
    let _lock = TargetLock::acquire(&settings.lock_dir, &target)?;
    info!("Locked deploy target {}", target);

    Deployer::new(executor, options).deploy(config).await
}
