use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use crate::redact::redact_command;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("refusing to run an empty command")]
    EmptyCommand,

    #[error("failed to start `{program}`")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("command failed ({status}): {command}\n{stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` output was not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        source: std::string::FromUtf8Error,
    },
}

/// Abstraction over child-process execution for testability.
///
/// Production code uses [`SystemExecutor`], tests use mockall-generated mocks.
/// An empty `dir` means the current directory. Failures are reported as-is;
/// retrying is up to the caller.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command, streaming its output to the terminal.
    async fn run(&self, command: &[String], dir: &Path) -> Result<(), ExecError>;

    /// Run a command and capture stdout.
    async fn run_with_output(&self, command: &[String], dir: &Path) -> Result<String, ExecError>;
}

/// Real process executor backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn command(command: &[String], dir: &Path) -> Result<tokio::process::Command, ExecError> {
        let (program, args) = command.split_first().ok_or(ExecError::EmptyCommand)?;
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        if !dir.as_os_str().is_empty() {
            cmd.current_dir(dir);
        }
        tracing::debug!(command = %redact_command(command), dir = %dir.display(), "spawning");
        Ok(cmd)
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, command: &[String], dir: &Path) -> Result<(), ExecError> {
        let status = Self::command(command, dir)?
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ExecError::Spawn {
                program: command[0].clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                command: redact_command(command),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }

    async fn run_with_output(&self, command: &[String], dir: &Path) -> Result<String, ExecError> {
        let output = Self::command(command, dir)?
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::Spawn {
                program: command[0].clone(),
                source: e,
            })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: command[0].clone(),
                source: e,
            })
        } else {
            Err(ExecError::CommandFailed {
                command: redact_command(command),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}
