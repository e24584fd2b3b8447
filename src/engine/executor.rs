// ABOUTME: Command executor running one local or remote step
// ABOUTME: Captures exit status and output, forwards output live, and enforces step timeouts

use chrono::Utc;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::error::{ExecutionError, Result};
use super::registry::ResolvedStep;
use super::result::{RunResult, StepStatus};
use crate::parser::StepKind;
use crate::session::{CommandOutput, RemoteCommand, SessionScope};

pub const DEFAULT_SHELL: &str = "/bin/sh";

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    default_timeout: Option<Duration>,
    echo_output: bool,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            default_timeout: None,
            echo_output: true,
        }
    }

    /// Shell used as `<shell> -c <command>` for local steps
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Limit applied to steps that do not set their own timeout
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Forward captured output to the terminal while it is produced
    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run one step. A command that runs and fails yields `Ok` with a failed
    /// or timed-out result; `Err` means the step could not be run at all.
    pub async fn execute(
        &self,
        resolved: &ResolvedStep,
        scope: &mut SessionScope,
    ) -> Result<RunResult> {
        let label = resolved.label();
        let step = &resolved.step;
        let target = match step.kind {
            StepKind::Local => None,
            StepKind::Remote => scope.target().map(ToString::to_string),
        };
        let limit = step.timeout.or(self.default_timeout);

        info!(
            "Running {} on {}: {}",
            label,
            target.as_deref().unwrap_or("localhost"),
            step.command
        );

        let start_time = Utc::now();
        let started = Instant::now();

        let outcome = match limit {
            Some(limit) => timeout(limit, self.dispatch(resolved, &label, scope))
                .await
                .ok(),
            None => Some(self.dispatch(resolved, &label, scope).await),
        };

        let mut result = RunResult {
            step: label,
            kind: step.kind,
            command: step.command.clone(),
            target,
            status: StepStatus::Success,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            start_time,
            duration: Duration::ZERO,
            timeout: None,
        };

        match outcome {
            Some(output) => {
                let output = output?;
                result.status = if output.success() {
                    StepStatus::Success
                } else {
                    StepStatus::Failed
                };
                result.exit_code = output.exit_code;
                result.stdout = output.stdout;
                result.stderr = output.stderr;
            }
            None => {
                result.status = StepStatus::TimedOut;
                result.timeout = limit;
            }
        }
        result.duration = started.elapsed();

        match result.status {
            StepStatus::Success => debug!("{} finished in {:?}", result.step, result.duration),
            StepStatus::Failed => error!(
                "{} failed on {} with exit code {:?}",
                result.step,
                result.location(),
                result.exit_code
            ),
            StepStatus::TimedOut => error!(
                "{} timed out on {} after {:?}",
                result.step,
                result.location(),
                result.duration
            ),
        }

        Ok(result)
    }

    async fn dispatch(
        &self,
        resolved: &ResolvedStep,
        label: &str,
        scope: &mut SessionScope,
    ) -> Result<CommandOutput> {
        match resolved.step.kind {
            StepKind::Local if resolved.step.interactive => {
                self.run_interactive(resolved, label).await
            }
            StepKind::Local => self.run_local(resolved, label).await,
            StepKind::Remote => self.run_remote(resolved, scope).await,
        }
    }

    fn local_command(&self, resolved: &ResolvedStep) -> Command {
        let step = &resolved.step;
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(&step.command).envs(&step.env);
        if let Some(ref dir) = step.working_dir {
            command.current_dir(dir);
        }
        // Timeouts and cancellation drop the child future
        command.kill_on_drop(true);
        command
    }

    async fn run_local(&self, resolved: &ResolvedStep, label: &str) -> Result<CommandOutput> {
        let mut child = self
            .local_command(resolved)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                step: label.to_string(),
                source,
            })?;

        let echo = self.echo_output;
        let stdout = forward(child.stdout.take(), Stream::Stdout, echo);
        let stderr = forward(child.stderr.take(), Stream::Stderr, echo);
        let (stdout, stderr, status) = tokio::try_join!(stdout, stderr, child.wait())?;

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }

    async fn run_interactive(
        &self,
        resolved: &ResolvedStep,
        label: &str,
    ) -> Result<CommandOutput> {
        let status = self
            .local_command(resolved)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| ExecutionError::Spawn {
                step: label.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            exit_code: status.code(),
            ..Default::default()
        })
    }

    async fn run_remote(
        &self,
        resolved: &ResolvedStep,
        scope: &mut SessionScope,
    ) -> Result<CommandOutput> {
        let step = &resolved.step;
        if step.interactive {
            warn!(
                "{} is interactive; remote steps run without a terminal",
                resolved.label()
            );
        }

        let command = RemoteCommand::new(step.command.clone())
            .in_dir(step.working_dir.clone())
            .with_env(step.env.clone());

        let session = scope.session().await?;
        let output = session.run(&command).await?;

        if self.echo_output {
            echo_bytes(output.stdout.as_bytes(), Stream::Stdout);
            echo_bytes(output.stderr.as_bytes(), Stream::Stderr);
        }

        Ok(output)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a child pipe to the end, echoing each line as it arrives. Bytes are
/// kept as produced and decoded lossily once the pipe closes.
async fn forward<R>(reader: Option<R>, stream: Stream, echo: bool) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    loop {
        let start = captured.len();
        if reader.read_until(b'\n', &mut captured).await? == 0 {
            break;
        }
        if echo {
            echo_bytes(&captured[start..], stream);
        }
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}

fn echo_bytes(bytes: &[u8], stream: Stream) {
    let written = match stream {
        Stream::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes).and_then(|_| out.flush())
        }
        Stream::Stderr => std::io::stderr().lock().write_all(bytes),
    };
    if let Err(e) = written {
        debug!("Failed to echo step output: {}", e);
    }
}
