//! External command execution
//!
//! Drivers reach the host package manager only through [`CommandRunner`],
//! which keeps every shell-out in one place and lets tests substitute
//! canned output.

use crate::error::{ReproError, ReproResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs package manager commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its stdout
    async fn output(&self, program: &str, args: &[String]) -> ReproResult<String>;

    /// Run a command and capture its stdout, logging a non-zero exit
    /// instead of failing. Failure to spawn is still an error.
    async fn output_lenient(&self, program: &str, args: &[String]) -> ReproResult<String>;

    /// Run a command with inherited stdio (installers)
    async fn run_interactive(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> ReproResult<()>;
}

/// Human-readable command line for errors and logs
pub(crate) fn display_command(program: &str, args: &[String]) -> String {
    let mut s = program.to_string();
    for arg in args {
        s.push(' ');
        s.push_str(arg);
    }
    s
}

/// Runs commands on the host
pub struct SystemRunner;

async fn capture(
    program: &str,
    args: &[String],
    command: &str,
) -> ReproResult<std::process::Output> {
    debug!("Executing: {}", command);
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ReproError::command_failed(command, e))
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> ReproResult<String> {
        let command = display_command(program, args);
        let output = capture(program, args, &command).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReproError::command_exec(
                command,
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn output_lenient(&self, program: &str, args: &[String]) -> ReproResult<String> {
        let command = display_command(program, args);
        let output = capture(program, args, &command).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}: {}", program, output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_interactive(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> ReproResult<()> {
        let command = display_command(program, args);
        debug!("Executing interactively: {}", command);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReproError::command_failed(command.clone(), e))?;

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| ReproError::command_failed(command.clone(), e))?
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(ReproError::Cancelled);
            }
        };

        if !status.success() {
            return Err(ReproError::command_exec(command, status.to_string()));
        }
        Ok(())
    }
}
