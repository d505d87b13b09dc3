//! Deploy orchestrator
//!
//! Drives the stages of [`Stage`] in order against a [`RemoteExecutor`]:
//! at most one remote command is in flight, each stage runs only after the
//! previous one reported success, and the first failure ends the run with
//! the filesystem left as the last completed stage wrote it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::app::options::DeployOptions;
use crate::deploy::audit::{is_object_id, AuditLogEntry};
use crate::deploy::executor::{run_command, RemoteExecutor, StageResult};
use crate::deploy::fsm::{PipelineFsm, RunState, Stage, StageEvent};
use crate::deploy::git;
use crate::deploy::layout::PathLayout;
use crate::deploy::release::ReleaseId;
use crate::deploy::retention;
use crate::errors::DeployError;
use crate::filesys::dir::RemoteDir;
use crate::filesys::file::RemoteFile;
use crate::filesys::link::RemoteLink;
use crate::models::deployment::{DeployOutcome, DeploymentConfig, RetentionOutcome, SyncMode};
use crate::shell::RemoteCommand;

/// Everything a run needs, fixed before the first command is issued
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: DeploymentConfig,
    pub layout: PathLayout,
}

impl RunContext {
    pub fn new(config: DeploymentConfig, release_id: ReleaseId) -> Self {
        let layout = PathLayout::resolve(&config, release_id);
        Self { config, layout }
    }

    pub fn release_id(&self) -> &ReleaseId {
        self.layout.release_id()
    }
}

/// Values produced by stages and needed by later ones
#[derive(Debug, Default)]
struct Progress {
    sync_mode: Option<SyncMode>,
    commit: Option<String>,
    retention: Option<RetentionOutcome>,
}

/// Runs deploys through one executor
pub struct Deployer {
    executor: Arc<dyn RemoteExecutor>,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(executor: Arc<dyn RemoteExecutor>, options: DeployOptions) -> Self {
        Self { executor, options }
    }

    /// Deploy `config` as a new release named after the current time
    pub async fn deploy(&self, config: &DeploymentConfig) -> Result<DeployOutcome, DeployError> {
        config.validate()?;
        let context = RunContext::new(config.clone(), ReleaseId::now());
        self.run(&context).await
    }

    /// Run every stage for a prepared context
    pub async fn run(&self, ctx: &RunContext) -> Result<DeployOutcome, DeployError> {
        ctx.config.validate()?;
        info!(
            "Deploying {} ({} @ {}) as release {} to {}",
            ctx.config.name,
            ctx.config.repository,
            ctx.config.revision,
            ctx.release_id(),
            ctx.layout.deploy_dir().display()
        );

        let mut fsm = PipelineFsm::new();
        fsm.process(StageEvent::Start)
            .map_err(DeployError::PipelineError)?;

        let mut progress = Progress::default();
        while let Some(stage) = fsm.current() {
            debug!("Entering stage {}", stage);
            match self.run_stage(stage, ctx, &mut progress).await {
                Ok(()) => {
                    fsm.process(StageEvent::Succeeded)
                        .map_err(DeployError::PipelineError)?;
                }
                Err(e) => {
                    error!(
                        exit_code = ?e.exit_code(),
                        "Deploy of {} failed at {}: {}",
                        ctx.config.name,
                        stage,
                        e
                    );
                    fsm.process(StageEvent::Failed(e.to_string()))
                        .map_err(DeployError::PipelineError)?;
                    return Err(e);
                }
            }
        }

        if fsm.state() != &RunState::Done {
            return Err(DeployError::PipelineError(format!(
                "pipeline stopped in state {:?}",
                fsm.state()
            )));
        }

        let outcome = DeployOutcome {
            release_id: ctx.release_id().clone(),
            release_dir: ctx.layout.release_dir(),
            sync_mode: progress
                .sync_mode
                .ok_or_else(|| DeployError::PipelineError("sync mode not recorded".to_string()))?,
            commit: progress
                .commit
                .ok_or_else(|| DeployError::PipelineError("commit not recorded".to_string()))?,
            retention: progress.retention.unwrap_or(RetentionOutcome::Pruned {
                removed: Vec::new(),
            }),
        };

        info!(
            "Release {} of {} is live ({})",
            outcome.release_id, ctx.config.name, outcome.commit
        );
        Ok(outcome)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &RunContext,
        progress: &mut Progress,
    ) -> Result<(), DeployError> {
        match stage {
            Stage::EnsureLayout => self.ensure_layout(ctx).await,
            Stage::SyncRepository => {
                progress.sync_mode = Some(self.sync_repository(ctx).await?);
                Ok(())
            }
            Stage::ExtractRevision => self.extract_revision(ctx).await,
            Stage::SwapCurrent => self.swap_current(ctx).await,
            Stage::AppendAudit => {
                progress.commit = Some(self.append_audit(ctx).await?);
                Ok(())
            }
            Stage::EnforceRetention => {
                progress.retention = Some(self.enforce_retention(ctx).await);
                Ok(())
            }
        }
    }

    async fn exec(&self, stage: Stage, command: &RemoteCommand) -> Result<StageResult, DeployError> {
        debug!("[{}] {}", stage, command);
        run_command(self.executor.as_ref(), command, self.options.stage_timeout)
            .await
            .map_err(|source| DeployError::ExecutorError { stage, source })
    }

    async fn ensure_layout(&self, ctx: &RunContext) -> Result<(), DeployError> {
        let repo = RemoteDir::new(ctx.layout.repo_dir());
        let releases = RemoteDir::new(ctx.layout.releases_dir());

        let result = self
            .exec(Stage::EnsureLayout, &RemoteDir::create_all([&repo, &releases]))
            .await?;
        if !result.success() {
            return Err(DeployError::LayoutError {
                exit_code: result.exit_code,
            });
        }
        Ok(())
    }

    async fn sync_repository(&self, ctx: &RunContext) -> Result<SyncMode, DeployError> {
        let repo_dir = ctx.layout.repo_dir();

        let probe = self
            .exec(Stage::SyncRepository, &git::probe_checkout(&repo_dir))
            .await?;
        let (mode, command) = if probe.success() {
            (SyncMode::Fetch, git::fetch(&repo_dir))
        } else {
            (SyncMode::Clone, git::clone(&ctx.config.repository, &repo_dir))
        };

        info!("Syncing checkout at {} ({})", repo_dir.display(), mode);
        let result = self.exec(Stage::SyncRepository, &command).await?;
        if !result.success() {
            return Err(DeployError::SyncError {
                mode,
                exit_code: result.exit_code,
            });
        }
        Ok(mode)
    }

    async fn extract_revision(&self, ctx: &RunContext) -> Result<(), DeployError> {
        let command = git::extract(
            &ctx.layout.repo_dir(),
            &ctx.config.revision,
            &ctx.layout.release_dir(),
        );

        let result = self.exec(Stage::ExtractRevision, &command).await?;
        if !result.success() {
            return Err(DeployError::ExtractError {
                revision: ctx.config.revision.clone(),
                exit_code: result.exit_code,
            });
        }
        info!("Extracted {} into {}", ctx.config.revision, ctx.layout.release_dir().display());
        Ok(())
    }

    async fn swap_current(&self, ctx: &RunContext) -> Result<(), DeployError> {
        let current = RemoteLink::new(ctx.layout.current_link());
        let command = current.swap_to(&ctx.layout.current_target(), &ctx.layout.staging_link());

        let result = self.exec(Stage::SwapCurrent, &command).await?;
        if !result.success() {
            return Err(DeployError::SymlinkError {
                exit_code: result.exit_code,
            });
        }
        info!("{} -> {}", current.path().display(), ctx.layout.current_target().display());
        Ok(())
    }

    /// Resolve the commit now, so the log records what was extracted
    async fn append_audit(&self, ctx: &RunContext) -> Result<String, DeployError> {
        let resolved = self
            .exec(
                Stage::AppendAudit,
                &git::resolve_commit(&ctx.layout.repo_dir(), &ctx.config.revision),
            )
            .await?;
        if !resolved.success() {
            return Err(DeployError::AuditError {
                reason: format!("could not resolve {}", ctx.config.revision),
                exit_code: resolved.exit_code,
            });
        }

        let commit = resolved.output.trim().to_string();
        if !is_object_id(&commit) {
            return Err(DeployError::AuditError {
                reason: format!("unexpected commit id {:?}", commit),
                exit_code: resolved.exit_code,
            });
        }

        let entry = AuditLogEntry {
            timestamp: Utc::now(),
            user: self.options.user.clone(),
            repository: ctx.config.repository.clone(),
            revision: ctx.config.revision.clone(),
            commit: commit.clone(),
            release: ctx.release_id().to_string(),
        };

        let log = RemoteFile::new(ctx.layout.log_path());
        let result = self
            .exec(Stage::AppendAudit, &log.append_line(&entry.to_line()))
            .await?;
        if !result.success() {
            return Err(DeployError::AuditError {
                reason: format!("could not append to {}", log.path().display()),
                exit_code: result.exit_code,
            });
        }
        Ok(commit)
    }

    /// Never fails the run: the release is already live
    async fn enforce_retention(&self, ctx: &RunContext) -> RetentionOutcome {
        let result = retention::enforce(
            self.executor.as_ref(),
            &ctx.layout.releases_dir(),
            self.options.keep_releases,
            Some(ctx.release_id().as_str()),
            self.options.stage_timeout,
        )
        .await;

        match result {
            Ok(removed) => RetentionOutcome::Pruned { removed },
            Err(e) => {
                warn!(
                    exit_code = ?e.exit_code(),
                    "Release {} is live but cleanup failed: {}",
                    ctx.release_id(),
                    e
                );
                RetentionOutcome::Failed(e)
            }
        }
    }
}
