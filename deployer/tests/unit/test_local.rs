//! End-to-end deploys on this machine through `sh`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use reldeploy::app::options::DeployOptions;
use reldeploy::deploy::audit::AuditLogEntry;
use reldeploy::deploy::executor::LocalExecutor;
use reldeploy::deploy::pipeline::{Deployer, RunContext};
use reldeploy::deploy::release::ReleaseId;
use reldeploy::errors::DeployError;
use reldeploy::models::deployment::{DeploymentConfig, RetentionOutcome, SyncMode};

fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// `mv -T` is GNU coreutils
fn environment_ready() -> bool {
    let ready = ["git", "tar", "mv"].iter().all(|tool| tool_available(tool));
    if !ready {
        eprintln!("skipping: git, tar or GNU mv not available");
    }
    ready
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// An origin repository with two commits; `v2.0` tags the second
fn make_origin(root: &Path) -> PathBuf {
    let origin = root.join("origin");
    fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "-q"]);

    fs::write(origin.join("app.txt"), "v1\n").unwrap();
    git(&origin, &["add", "."]);
    git(&origin, &["commit", "-q", "-m", "first"]);
    git(&origin, &["tag", "v1.0"]);

    fs::write(origin.join("app.txt"), "v2\n").unwrap();
    fs::create_dir_all(origin.join("config")).unwrap();
    fs::write(origin.join("config/app.json"), "{}\n").unwrap();
    git(&origin, &["add", "."]);
    git(&origin, &["commit", "-q", "-m", "second"]);
    git(&origin, &["tag", "v2.0"]);

    origin
}

struct Fixture {
    _root: TempDir,
    origin: PathBuf,
    deploy_dir: PathBuf,
    deployer: Deployer,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let origin = make_origin(root.path());
        let deploy_dir = root.path().join("srv").join("app");
        let options = DeployOptions {
            stage_timeout: Duration::from_secs(60),
            keep_releases: 5,
            user: "tester".to_string(),
        };
        let deployer = Deployer::new(Arc::new(LocalExecutor::new()), options);

        Self {
            _root: root,
            origin,
            deploy_dir,
            deployer,
        }
    }

    fn config(&self, revision: &str) -> DeploymentConfig {
        DeploymentConfig::new("app", self.origin.to_string_lossy())
            .with_revision(revision)
            .with_deploy_dir(&self.deploy_dir)
    }

    fn context(&self, revision: &str, second: u32) -> RunContext {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, second).unwrap();
        RunContext::new(self.config(revision), ReleaseId::from_instant(at))
    }

    fn releases(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.deploy_dir.join("releases"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn audit_lines(&self) -> Vec<String> {
        fs::read_to_string(self.deploy_dir.join("revisions.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[tokio::test]
async fn test_first_deploy_clones_then_fetches() {
    if !environment_ready() {
        return;
    }
    let fixture = Fixture::new();

    let first = fixture
        .deployer
        .run(&fixture.context("v2.0", 0))
        .await
        .unwrap();
    assert_eq!(first.sync_mode, SyncMode::Clone);
    assert_eq!(first.release_id.as_str(), "20240601120000");
    assert_eq!(fs::read_to_string(first.release_dir.join("app.txt")).unwrap(), "v2\n");
    assert!(first.release_dir.join("config/app.json").exists());
    assert!(!first.release_dir.join(".git").exists());

    let current = fixture.deploy_dir.join("current");
    assert_eq!(
        fs::read_link(&current).unwrap(),
        PathBuf::from("releases/20240601120000")
    );
    assert!(!fixture.deploy_dir.join(".current-20240601120000").exists());

    let second = fixture
        .deployer
        .run(&fixture.context("v1.0", 1))
        .await
        .unwrap();
    assert_eq!(second.sync_mode, SyncMode::Fetch);
    assert_eq!(fs::read_to_string(current.join("app.txt")).unwrap(), "v1\n");
    assert_eq!(
        fs::read_link(&current).unwrap(),
        PathBuf::from("releases/20240601120001")
    );
    assert_eq!(fixture.releases(), vec!["20240601120000", "20240601120001"]);
}

#[tokio::test]
async fn test_audit_log_records_each_deploy() {
    if !environment_ready() {
        return;
    }
    let fixture = Fixture::new();
    let expected = git(&fixture.origin, &["rev-parse", "v2.0^{commit}"]);

    fixture
        .deployer
        .run(&fixture.context("v2.0", 0))
        .await
        .unwrap();
    let first_line = fixture.audit_lines().remove(0);

    let entry = AuditLogEntry::parse(&first_line).unwrap();
    assert_eq!(entry.user, "tester");
    assert_eq!(entry.repository, fixture.origin.to_string_lossy());
    assert_eq!(entry.revision, "v2.0");
    assert_eq!(entry.commit, expected);
    assert_eq!(entry.release, "20240601120000");

    fixture
        .deployer
        .run(&fixture.context("v1.0", 1))
        .await
        .unwrap();
    let lines = fixture.audit_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], first_line);
    assert_eq!(AuditLogEntry::parse(&lines[1]).unwrap().revision, "v1.0");
}

#[tokio::test]
async fn test_unknown_revision_fails_before_release_exists() {
    if !environment_ready() {
        return;
    }
    let fixture = Fixture::new();

    let err = fixture
        .deployer
        .run(&fixture.context("no-such-tag", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ExtractError { .. }));

    assert!(fixture.releases().is_empty());
    assert!(fs::symlink_metadata(fixture.deploy_dir.join("current")).is_err());
    assert!(!fixture.deploy_dir.join("revisions.log").exists());
}

#[tokio::test]
async fn test_retention_keeps_newest_five() {
    if !environment_ready() {
        return;
    }
    let fixture = Fixture::new();

    // Old releases with distinct, ascending mtimes
    let releases_dir = fixture.deploy_dir.join("releases");
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    for i in 0..7u64 {
        let dir = releases_dir.join(format!("2020010100000{}", i));
        fs::create_dir_all(&dir).unwrap();
        fs::File::open(&dir)
            .unwrap()
            .set_modified(base + Duration::from_secs(i * 60))
            .unwrap();
    }

    let outcome = fixture
        .deployer
        .run(&fixture.context("v2.0", 0))
        .await
        .unwrap();

    match &outcome.retention {
        RetentionOutcome::Pruned { removed } => {
            assert_eq!(
                removed,
                &["20200101000002", "20200101000001", "20200101000000"]
            );
        }
        other => panic!("expected Pruned, got {:?}", other),
    }
    assert_eq!(
        fixture.releases(),
        vec![
            "20200101000003",
            "20200101000004",
            "20200101000005",
            "20200101000006",
            "20240601120000",
        ]
    );
}
