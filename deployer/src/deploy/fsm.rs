//! Finite State Machine for the deploy pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Create the checkout and releases directories
    EnsureLayout,

    /// Clone or fetch the shared checkout
    SyncRepository,

    /// Unpack the revision into a fresh release directory
    ExtractRevision,

    /// Point `current` at the new release
    SwapCurrent,

    /// Append one line to the audit log
    AppendAudit,

    /// Prune old releases
    EnforceRetention,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::EnsureLayout,
        Stage::SyncRepository,
        Stage::ExtractRevision,
        Stage::SwapCurrent,
        Stage::AppendAudit,
        Stage::EnforceRetention,
    ];

    /// The stage that runs after this one
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::EnsureLayout => Some(Stage::SyncRepository),
            Stage::SyncRepository => Some(Stage::ExtractRevision),
            Stage::ExtractRevision => Some(Stage::SwapCurrent),
            Stage::SwapCurrent => Some(Stage::AppendAudit),
            Stage::AppendAudit => Some(Stage::EnforceRetention),
            Stage::EnforceRetention => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::EnsureLayout => "ensure_layout",
            Stage::SyncRepository => "sync_repository",
            Stage::ExtractRevision => "extract_revision",
            Stage::SwapCurrent => "swap_current",
            Stage::AppendAudit => "append_audit",
            Stage::EnforceRetention => "enforce_retention",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Nothing issued yet
    Pending,

    /// A stage is in flight
    Running(Stage),

    /// Every stage succeeded
    Done,

    /// A stage failed and every later stage was skipped
    Failed(Stage),
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// Begin the first stage
    Start,

    /// The running stage finished successfully
    Succeeded,

    /// The running stage failed
    Failed(String),
}

/// Deploy pipeline FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: RunState,
    completed: Vec<Stage>,
    error: Option<String>,
}

impl PipelineFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
            completed: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// The stage currently in flight
    pub fn current(&self) -> Option<Stage> {
        match self.state {
            RunState::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Stages that finished successfully, in order
    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Done | RunState::Failed(_))
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: StageEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (RunState::Pending, StageEvent::Start) => RunState::Running(Stage::EnsureLayout),

            (RunState::Running(stage), StageEvent::Succeeded) => {
                let stage = *stage;
                self.completed.push(stage);
                match stage.next() {
                    Some(next) => RunState::Running(next),
                    None => RunState::Done,
                }
            }
            (RunState::Running(stage), StageEvent::Failed(err)) => {
                self.error = Some(err.clone());
                RunState::Failed(*stage)
            }

            // Terminal states accept nothing
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
