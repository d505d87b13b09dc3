//! Remote command execution
//!
//! The pipeline only ever talks to a host through [`RemoteExecutor`]. An
//! executor accepts a [`RemoteCommand`] and hands back a [`CommandHandle`]
//! that yields output chunks followed by exactly one exit status.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::ExecError;
use crate::shell::RemoteCommand;
use crate::storage::settings::SshSettings;

/// Events emitted by a running command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// A chunk of stdout
    Data(Vec<u8>),

    /// Terminal exit status
    Exit(i32),
}

/// Exit status and stdout of one finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub exit_code: i32,
    pub output: String,
}

impl StageResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Receiving end of a running command
///
/// Dropping the handle abandons the command; process-backed executors kill
/// the child when that happens.
#[derive(Debug)]
pub struct CommandHandle {
    events: mpsc::Receiver<CommandEvent>,
}

impl CommandHandle {
    pub fn new(events: mpsc::Receiver<CommandEvent>) -> Self {
        Self { events }
    }

    /// A handle plus the sender an executor feeds it through
    pub fn channel(buffer: usize) -> (mpsc::Sender<CommandEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    pub async fn next_event(&mut self) -> Option<CommandEvent> {
        self.events.recv().await
    }

    /// Collect output until the exit status arrives
    pub async fn wait(mut self) -> Result<StageResult, ExecError> {
        let mut output = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                CommandEvent::Data(chunk) => output.extend_from_slice(&chunk),
                CommandEvent::Exit(exit_code) => {
                    return Ok(StageResult {
                        exit_code,
                        output: String::from_utf8_lossy(&output).into_owned(),
                    });
                }
            }
        }
        Err(ExecError::Disconnected)
    }
}

/// Something that can run shell command lines on the deploy host
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Issue a command; completion is reported through the handle
    async fn execute(&self, command: &RemoteCommand) -> Result<CommandHandle, ExecError>;

    /// Identifies the host, used to key the per-target lock
    fn target(&self) -> String;
}

/// Run a command to completion, bounded by `timeout`
///
/// On timeout the handle is dropped, which cancels the command.
pub async fn run_command(
    executor: &dyn RemoteExecutor,
    command: &RemoteCommand,
    timeout: Duration,
) -> Result<StageResult, ExecError> {
    let run = async {
        let handle = executor.execute(command).await?;
        handle.wait().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => Err(ExecError::Timeout(timeout)),
    }
}

/// Runs commands on this machine through `sh -c`
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn execute(&self, command: &RemoteCommand) -> Result<CommandHandle, ExecError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command.render());
        spawn_process(cmd)
    }

    fn target(&self) -> String {
        "localhost".to_string()
    }
}

/// Runs commands through the system `ssh` client
///
/// Authentication, host keys and proxies are left to the user's ssh
/// configuration; batch mode stops ssh from ever prompting.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    user: Option<String>,
    port: u16,
    connect_timeout: Duration,
}

impl SshExecutor {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: 22,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(settings: &SshSettings) -> Self {
        Self {
            host: settings.host.clone(),
            user: settings.user.clone().filter(|u| !u.is_empty()),
            port: settings.port,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Arguments passed to `ssh`, ending with the rendered remote command
    pub fn ssh_args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ];

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        if let Some(user) = &self.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }

        args.push("--".to_string());
        args.push(self.host.clone());
        args.push(command.render());
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &RemoteCommand) -> Result<CommandHandle, ExecError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(command));
        spawn_process(cmd)
    }

    fn target(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}:{}", user, self.host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

fn spawn_process(mut cmd: Command) -> Result<CommandHandle, ExecError> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecError::Spawn(e.to_string()))?;

    let (tx, handle) = CommandHandle::channel(64);
    tokio::spawn(pump(child, tx));
    Ok(handle)
}

/// Forward stdout as data events, log stderr, then report the exit status
async fn pump(mut child: Child, tx: mpsc::Sender<CommandEvent>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let forward_stdout = async {
        let Some(mut stdout) = stdout else { return };
        let mut buf = [0u8; 4096];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(CommandEvent::Data(buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read command output: {}", e);
                    break;
                }
            }
        }
    };

    let log_stderr = async {
        let Some(stderr) = stderr else { return };
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "reldeploy::remote", "{}", line);
        }
    };

    let finished = async {
        tokio::join!(forward_stdout, log_stderr);
        child.wait().await
    };

    tokio::select! {
        status = finished => {
            let exit_code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!("Failed to wait for command: {}", e);
                    -1
                }
            };
            let _ = tx.send(CommandEvent::Exit(exit_code)).await;
        }
        _ = tx.closed() => {
            debug!("Command handle dropped, killing process");
        }
    }
}
