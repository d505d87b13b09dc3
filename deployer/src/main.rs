//! reldeploy - Entry Point
//!
//! Deploys one Git revision of one application to a host as a new release.

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use tracing::error;

use reldeploy::app::args::{CliArgs, USAGE};
use reldeploy::app::options::DeployOptions;
use reldeploy::app::run::run;
use reldeploy::errors::DeployError;
use reldeploy::logs::{init_logging, LogOptions};
use reldeploy::models::deployment::{DeployOutcome, DeploymentConfig, RetentionOutcome};
use reldeploy::storage::settings::Settings;
use reldeploy::utils::{read_json, version_info};

const EXIT_FAILED: u8 = 1;
const EXIT_CLEANUP_FAILED: u8 = 2;
const EXIT_USAGE: u8 = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse(env::args().skip(1));

    if cli_args.flag("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    if cli_args.flag("help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    // Settings first, so logging is configured before anything else runs
    let settings = match load_settings(&cli_args).await {
        Ok(settings) => settings,
        Err(e) => return usage_error(e),
    };

    let _log_guard = match init_logging(LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let config = match load_config(&cli_args).await {
        Ok(config) => config,
        Err(e) => return usage_error(e),
    };

    let mut options = DeployOptions::from(&settings);
    if let Some(user) = cli_args.audit_user() {
        options = options.with_user(user);
    }

    match run(&config, &settings, options).await {
        Ok(outcome) => {
            print_summary(&config, &outcome);
            if outcome.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_CLEANUP_FAILED)
            }
        }
        Err(DeployError::ConfigError(msg)) => usage_error(DeployError::ConfigError(msg)),
        Err(e) => {
            error!("Deploy failed: {}", e);
            let stage = e
                .stage()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "setup".to_string());
            eprintln!("{} {} failed at {}: {}", "✗".red(), config.name, stage, e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn load_settings(cli_args: &CliArgs) -> Result<Settings, DeployError> {
    let settings = match cli_args.settings_path() {
        Some(path) => Settings::load(&path).await?,
        None => Settings::default(),
    };
    cli_args.apply_settings(settings)
}

async fn load_config(cli_args: &CliArgs) -> Result<DeploymentConfig, DeployError> {
    let base = match cli_args.config_path() {
        Some(path) => Some(read_json::<DeploymentConfig>(&path).await?),
        None => None,
    };
    cli_args.deployment_config(base)
}

fn usage_error(e: DeployError) -> ExitCode {
    eprintln!("{} {}", "error:".red().bold(), e);
    eprintln!("{}", USAGE);
    ExitCode::from(EXIT_USAGE)
}

fn print_summary(config: &DeploymentConfig, outcome: &DeployOutcome) {
    println!(
        "{} {} {} -> {} ({}, {})",
        "✓".green(),
        config.name.bold(),
        config.revision,
        outcome.release_dir.display(),
        &outcome.commit[..outcome.commit.len().min(12)],
        outcome.sync_mode
    );

    match &outcome.retention {
        RetentionOutcome::Pruned { removed } if removed.is_empty() => {}
        RetentionOutcome::Pruned { removed } => {
            println!("  removed {} old release(s): {}", removed.len(), removed.join(", "));
        }
        RetentionOutcome::Failed(e) => {
            println!("  {} cleanup failed: {}", "!".yellow(), e);
        }
    }
}
