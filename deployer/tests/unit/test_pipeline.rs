//! Pipeline tests against a scripted executor

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use reldeploy::app::options::DeployOptions;
use reldeploy::deploy::executor::{CommandEvent, CommandHandle, RemoteExecutor};
use reldeploy::deploy::fsm::Stage;
use reldeploy::deploy::pipeline::{Deployer, RunContext};
use reldeploy::deploy::release::ReleaseId;
use reldeploy::errors::{DeployError, ExecError, RetentionError};
use reldeploy::models::deployment::{DeployOutcome, DeploymentConfig, RetentionOutcome, SyncMode};
use reldeploy::shell::RemoteCommand;

const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

#[derive(Debug, Clone)]
enum Reply {
    Exit(i32),
    Output(String, i32),
    Hang,
}

/// Answers commands by the first rule whose needle the command contains
struct ScriptedExecutor {
    rules: Vec<(String, Reply)>,
    issued: Mutex<Vec<String>>,
    hung: Mutex<Vec<mpsc::Sender<CommandEvent>>>,
}

impl ScriptedExecutor {
    fn new() -> Self {
        Self {
            rules: Vec::new(),
            issued: Mutex::new(Vec::new()),
            hung: Mutex::new(Vec::new()),
        }
    }

    /// A host where every stage succeeds; earlier rules win
    fn healthy() -> Self {
        Self::new()
            .rule("archive", Reply::Exit(0))
            .rule("rev-parse --verify", Reply::Output(format!("{}\n", SHA), 0))
            .rule("ls -1At", Reply::Output(String::new(), 0))
    }

    fn rule(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    /// Put a rule in front of the existing ones
    fn first(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.insert(0, (needle.to_string(), reply));
        self
    }

    fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    fn issued_any(&self, needle: &str) -> bool {
        self.issued().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, command: &RemoteCommand) -> Result<CommandHandle, ExecError> {
        let rendered = command.render();
        self.issued.lock().unwrap().push(rendered.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| rendered.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Exit(0));

        let (tx, handle) = CommandHandle::channel(4);
        match reply {
            Reply::Exit(code) => {
                tx.send(CommandEvent::Exit(code)).await.unwrap();
            }
            Reply::Output(output, code) => {
                tx.send(CommandEvent::Data(output.into_bytes())).await.unwrap();
                tx.send(CommandEvent::Exit(code)).await.unwrap();
            }
            Reply::Hang => self.hung.lock().unwrap().push(tx),
        }
        Ok(handle)
    }

    fn target(&self) -> String {
        "scripted".to_string()
    }
}

fn options() -> DeployOptions {
    DeployOptions {
        stage_timeout: Duration::from_secs(5),
        keep_releases: 5,
        user: "tester".to_string(),
    }
}

fn context() -> RunContext {
    let config = DeploymentConfig::new("app", "/src/app.git")
        .with_revision("v2.0")
        .with_deploy_dir("/srv/app");
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    RunContext::new(config, ReleaseId::from_instant(at))
}

async fn run(
    executor: ScriptedExecutor,
    options: DeployOptions,
) -> (Arc<ScriptedExecutor>, Result<DeployOutcome, DeployError>) {
    let executor = Arc::new(executor);
    let deployer = Deployer::new(executor.clone(), options);
    let result = deployer.run(&context()).await;
    (executor, result)
}

#[tokio::test]
async fn test_fresh_host_clones() {
    let executor = ScriptedExecutor::healthy().first("rev-parse --git-dir", Reply::Exit(128));
    let (executor, result) = run(executor, options()).await;

    let outcome = result.unwrap();
    assert_eq!(outcome.sync_mode, SyncMode::Clone);
    assert_eq!(outcome.commit, SHA);
    assert_eq!(outcome.release_id.as_str(), "20240102030405");
    assert_eq!(
        outcome.release_dir,
        std::path::PathBuf::from("/srv/app/releases/20240102030405")
    );
    assert!(outcome.is_clean());

    let issued = executor.issued();
    assert_eq!(issued[0], "mkdir -p -- /srv/app/repo /srv/app/releases");
    assert_eq!(
        issued[1],
        "git --git-dir=/srv/app/repo/.git rev-parse --git-dir"
    );
    assert_eq!(
        issued[2],
        "git clone --quiet --no-checkout -- /src/app.git /srv/app/repo"
    );
    assert!(!executor.issued_any("fetch"));
}

#[tokio::test]
async fn test_populated_host_fetches() {
    let (executor, result) = run(ScriptedExecutor::healthy(), options()).await;

    let outcome = result.unwrap();
    assert_eq!(outcome.sync_mode, SyncMode::Fetch);
    assert!(executor.issued_any("git -C /srv/app/repo fetch --all --quiet"));
    assert!(!executor.issued_any("clone"));
}

#[tokio::test]
async fn test_stages_issue_commands_in_order() {
    let (executor, result) = run(ScriptedExecutor::healthy(), options()).await;
    result.unwrap();

    let issued = executor.issued();
    let position = |needle: &str| {
        issued
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("{} was never issued", needle))
    };

    assert!(position("mkdir -p") < position("rev-parse --git-dir"));
    assert!(position("rev-parse --git-dir") < position("fetch"));
    assert!(position("fetch") < position("archive"));
    assert!(position("archive") < position("ln -sfn"));
    assert!(position("ln -sfn") < position(">>"));
    assert!(position(">>") < position("ls -1At"));

    let swap = &issued[position("ln -sfn")];
    assert_eq!(
        swap,
        "ln -sfn releases/20240102030405 /srv/app/.current-20240102030405 \
         && mv -f -T /srv/app/.current-20240102030405 /srv/app/current"
    );

    let audit = &issued[position(">>")];
    assert!(audit.contains("tester /src/app.git v2.0"));
    assert!(audit.contains(SHA));
    assert!(audit.ends_with(">> /srv/app/revisions.log"));
}

#[tokio::test]
async fn test_layout_failure_stops_run() {
    let executor = ScriptedExecutor::healthy().first("mkdir -p", Reply::Exit(1));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::LayoutError { exit_code: 1 }));
    assert_eq!(err.stage(), Some(Stage::EnsureLayout));
    assert_eq!(executor.issued().len(), 1);
}

#[tokio::test]
async fn test_clone_failure_stops_run() {
    let executor = ScriptedExecutor::healthy()
        .first("clone", Reply::Exit(128))
        .first("rev-parse --git-dir", Reply::Exit(128));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        DeployError::SyncError {
            mode: SyncMode::Clone,
            exit_code: 128
        }
    ));
    assert_eq!(err.stage(), Some(Stage::SyncRepository));
    assert!(!executor.issued_any("archive"));
    assert!(!executor.issued_any("ln -sfn"));
}

#[tokio::test]
async fn test_fetch_failure_stops_run() {
    let executor = ScriptedExecutor::healthy().first("fetch", Reply::Exit(1));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        DeployError::SyncError {
            mode: SyncMode::Fetch,
            ..
        }
    ));
    assert!(!executor.issued_any("archive"));
}

#[tokio::test]
async fn test_extract_failure_leaves_current_alone() {
    let executor = ScriptedExecutor::healthy().first("archive", Reply::Exit(2));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    match &err {
        DeployError::ExtractError {
            revision,
            exit_code,
        } => {
            assert_eq!(revision, "v2.0");
            assert_eq!(*exit_code, 2);
        }
        other => panic!("expected ExtractError, got {:?}", other),
    }
    assert_eq!(err.stage(), Some(Stage::ExtractRevision));
    assert!(!executor.issued_any("ln -sfn"));
    assert!(!executor.issued_any(">>"));
}

#[tokio::test]
async fn test_symlink_failure_skips_audit() {
    let executor = ScriptedExecutor::healthy().first("ln -sfn", Reply::Exit(1));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::SymlinkError { exit_code: 1 }));
    assert!(!executor.issued_any(">>"));
    assert!(!executor.issued_any("ls -1At"));
}

#[tokio::test]
async fn test_audit_failure_skips_retention() {
    let executor = ScriptedExecutor::healthy().first(">>", Reply::Exit(1));
    let (executor, result) = run(executor, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::AuditError { exit_code: 1, .. }));
    assert_eq!(err.stage(), Some(Stage::AppendAudit));
    assert!(!executor.issued_any("ls -1At"));
}

#[tokio::test]
async fn test_unexpected_commit_output_is_audit_error() {
    let executor = ScriptedExecutor::healthy().first(
        "rev-parse --verify",
        Reply::Output("not-a-sha\n".to_string(), 0),
    );
    let (executor, result) = run(executor, options()).await;

    assert!(matches!(
        result.unwrap_err(),
        DeployError::AuditError { .. }
    ));
    assert!(!executor.issued_any(">>"));
}

#[tokio::test]
async fn test_retention_evicts_oldest() {
    let listing = "20240102030405\n20231201000000\n20231101000000\n20231001000000\n\
                   20230901000000\n20230801000000\n20230701000000\n";
    let executor =
        ScriptedExecutor::healthy().first("ls -1At", Reply::Output(listing.to_string(), 0));
    let (executor, result) = run(executor, options()).await;

    let outcome = result.unwrap();
    match &outcome.retention {
        RetentionOutcome::Pruned { removed } => {
            assert_eq!(removed, &["20230801000000", "20230701000000"]);
        }
        other => panic!("expected Pruned, got {:?}", other),
    }

    let removals: Vec<String> = executor
        .issued()
        .into_iter()
        .filter(|c| c.starts_with("rm -rf"))
        .collect();
    assert_eq!(
        removals,
        vec![
            "rm -rf -- /srv/app/releases/20230801000000",
            "rm -rf -- /srv/app/releases/20230701000000",
        ]
    );
}

#[tokio::test]
async fn test_retention_failure_keeps_deploy() {
    let listing = "20240102030405\na\nb\nc\nd\ne\nf\n";
    let executor = ScriptedExecutor::healthy()
        .first("rm -rf", Reply::Exit(1))
        .first("ls -1At", Reply::Output(listing.to_string(), 0));
    let (executor, result) = run(executor, options()).await;

    let outcome = result.unwrap();
    assert!(!outcome.is_clean());
    match &outcome.retention {
        RetentionOutcome::Failed(RetentionError::Remove { entry, exit_code }) => {
            assert_eq!(entry, "e");
            assert_eq!(*exit_code, 1);
        }
        other => panic!("expected Remove failure, got {:?}", other),
    }

    // Stops at the first failed deletion
    let removals = executor
        .issued()
        .into_iter()
        .filter(|c| c.starts_with("rm -rf"))
        .count();
    assert_eq!(removals, 1);
}

#[tokio::test]
async fn test_retention_list_failure_keeps_deploy() {
    let executor = ScriptedExecutor::healthy().first("ls -1At", Reply::Exit(2));
    let (_, result) = run(executor, options()).await;

    let outcome = result.unwrap();
    assert!(matches!(
        outcome.retention,
        RetentionOutcome::Failed(RetentionError::List { exit_code: 2 })
    ));
}

#[tokio::test]
async fn test_hanging_stage_times_out() {
    let executor = ScriptedExecutor::healthy().first("fetch", Reply::Hang);
    let options = DeployOptions {
        stage_timeout: Duration::from_millis(50),
        ..options()
    };
    let (executor, result) = run(executor, options).await;

    match result.unwrap_err() {
        DeployError::ExecutorError { stage, source } => {
            assert_eq!(stage, Stage::SyncRepository);
            assert_eq!(source, ExecError::Timeout(Duration::from_millis(50)));
        }
        other => panic!("expected ExecutorError, got {:?}", other),
    }
    assert!(!executor.issued_any("archive"));
}

#[tokio::test]
async fn test_invalid_config_issues_nothing() {
    let executor = Arc::new(ScriptedExecutor::healthy());
    let deployer = Deployer::new(executor.clone(), options());

    let config = DeploymentConfig::new("../app", "/src/app.git");
    let result = deployer.deploy(&config).await;

    assert!(matches!(result, Err(DeployError::ConfigError(_))));
    assert!(executor.issued().is_empty());
}
