//! Remote executor
//!
//! Launches the `ssh` subprocess that runs a valve script on the remote host.
//! Output is read line by line while the process runs and forwarded on an
//! optional channel, and the full text of both streams is kept for the result.
//! This module knows nothing about HTTP, log files or subscribers.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use valve_core::domain::operation::{OperationId, OperationKind, OperationResult};

use crate::config::Config;

/// Channel the executor pushes output lines into while the process runs
pub type OutputSender = mpsc::UnboundedSender<OutputChunk>;

/// Which standard stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// A single line of remote output, newline stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub line: String,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for remote process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("remote operation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Runs a remote valve script and reports how it ended
///
/// A non-zero exit code is not an error at this layer; it comes back as a
/// normal [`OperationResult`] for the caller to interpret.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute the script selected by `kind`
    ///
    /// # Arguments
    /// * `kind` - Start or stop script
    /// * `payload` - Encoded payload passed as a single argument, if any
    /// * `operation_id` - Used for correlation in traces only
    /// * `output` - Receives every output line as soon as it is read
    async fn execute(
        &self,
        kind: OperationKind,
        payload: Option<&str>,
        operation_id: Option<&OperationId>,
        output: Option<OutputSender>,
    ) -> Result<OperationResult, ExecutorError>;
}

/// Executes remote scripts through the local `ssh` client
pub struct SshExecutor {
    ssh_binary: String,
    ssh_options: Vec<String>,
    destination: String,
    interpreter: String,
    start_script: String,
    stop_script: String,
    timeout: Option<Duration>,
}

impl SshExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            ssh_binary: config.ssh_binary.clone(),
            ssh_options: config.ssh_options.clone(),
            destination: config.destination(),
            interpreter: config.remote_interpreter.clone(),
            start_script: config.start_script_path.clone(),
            stop_script: config.stop_script_path.clone(),
            timeout: config.operation_timeout,
        }
    }

    /// Command line executed on the remote host
    pub fn remote_command(&self, kind: OperationKind, payload: Option<&str>) -> String {
        let script = match kind {
            OperationKind::Start => &self.start_script,
            OperationKind::Stop => &self.stop_script,
        };

        let mut command = format!("{} {}", self.interpreter, script);
        if let Some(payload) = payload {
            command.push(' ');
            command.push_str(&shell_escape(payload));
        }
        command
    }

    fn build_command(&self, kind: OperationKind, payload: Option<&str>) -> Command {
        let mut command = Command::new(&self.ssh_binary);
        command
            .args(&self.ssh_options)
            .arg(&self.destination)
            .arg(self.remote_command(kind, payload));
        command
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        kind: OperationKind,
        payload: Option<&str>,
        operation_id: Option<&OperationId>,
        output: Option<OutputSender>,
    ) -> Result<OperationResult, ExecutorError> {
        info!(
            operation_id = operation_id.map(|id| id.as_str()).unwrap_or("-"),
            "Spawning {} {} '{}'",
            self.ssh_binary,
            self.destination,
            self.remote_command(kind, payload)
        );

        let command = self.build_command(kind, payload);
        run_streaming(command, operation_id, output, self.timeout).await
    }
}

/// Spawn `command` and stream its output until it exits
///
/// Both pipes are drained concurrently so neither can fill up and stall the
/// child. The child is killed if `timeout` elapses or the future is dropped.
pub async fn run_streaming(
    mut command: Command,
    operation_id: Option<&OperationId>,
    output: Option<OutputSender>,
    timeout: Option<Duration>,
) -> Result<OperationResult, ExecutorError> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| ExecutorError::Spawn { program, source })?;

    let op = operation_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let stdout_task = tokio::spawn(pump(
        child.stdout.take(),
        OutputStream::Stdout,
        output.clone(),
        op.clone(),
    ));
    let stderr_task = tokio::spawn(pump(
        child.stderr.take(),
        OutputStream::Stderr,
        output,
        op.clone(),
    ));

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.map_err(ExecutorError::Wait)?,
            Err(_) => {
                warn!(operation_id = %op, "Remote process exceeded {:?}, killing it", limit);
                if let Err(e) = child.kill().await {
                    warn!(operation_id = %op, "Failed to kill remote process: {}", e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ExecutorError::TimedOut(limit));
            }
        },
        None => child.wait().await.map_err(ExecutorError::Wait)?,
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    // killed by a signal: no exit code
    let exit_code = status.code().unwrap_or(-1);

    info!(operation_id = %op, exit_code, "Remote process exited");

    Ok(OperationResult {
        exit_code,
        stdout,
        stderr,
    })
}

/// Read one pipe to the end, forwarding each non-empty line
async fn pump<R>(
    reader: Option<R>,
    stream: OutputStream,
    output: Option<OutputSender>,
    operation_id: String,
) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };

    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                captured.push_str(&text);

                let line = text.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }

                debug!(operation_id = %operation_id, %stream, "{}", line);

                if let Some(tx) = &output {
                    // receiver gone means nobody is listening any more
                    let _ = tx.send(OutputChunk {
                        stream,
                        line: line.to_string(),
                    });
                }
            }
            Err(e) => {
                warn!(operation_id = %operation_id, %stream, "Failed reading remote output: {}", e);
                break;
            }
        }
    }

    captured
}

/// Shell-escape a string for safe use in remote commands.
fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
