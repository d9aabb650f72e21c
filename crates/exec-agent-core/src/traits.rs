//! Core traits for driving a shell.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Output of one command, split into its body and the exit status line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Captured output with the echoed command and the exit status removed.
    pub output: String,
    /// Exit status exactly as printed by the shell.
    pub exit_code: String,
}

impl CommandOutput {
    #[must_use]
    pub fn new(output: impl Into<String>, exit_code: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: exit_code.into(),
        }
    }
}

/// Shell error.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Failed to spawn shell: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command output could not be decoded as utf-8")]
    Decode,
    #[error("Command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("Shell did not show a prompt within {} seconds", .0.as_secs())]
    StartupTimeout(Duration),
    #[error("Shell process has exited")]
    Exited,
    #[error("Shell session is closed")]
    Closed,
}

/// Sequential request/response access to a shell.
///
/// Implementations run one command at a time; callers must not issue a
/// second command before the first returns.
#[async_trait]
pub trait CommandRunner: Send {
    /// Run one command line and wait for the shell to become ready again.
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ShellError>;

    /// Whether the underlying process can still accept commands.
    fn is_alive(&mut self) -> bool {
        true
    }

    /// Terminate the underlying process.
    async fn close(&mut self) -> Result<(), ShellError> {
        Ok(())
    }
}

/// Creates ready-to-use shells.
#[async_trait]
pub trait ShellFactory: Send + Sync {
    type Shell: CommandRunner;

    /// Spawn a shell and wait until it accepts commands.
    async fn spawn(&self) -> Result<Self::Shell, ShellError>;
}
