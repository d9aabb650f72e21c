//! Configuration for the shell session and cell execution.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

/// How the shell process is started and driven.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell program, resolved on `PATH` when not absolute.
    pub program: String,
    /// Arguments passed to the shell.
    pub args: Vec<String>,
    /// Working directory for the shell. Inherited when unset.
    pub working_dir: Option<PathBuf>,
    /// Deadline for a single command to bring back the prompt.
    pub command_timeout: Duration,
    /// Deadline for the first prompt after spawn.
    pub startup_timeout: Duration,
    /// How long to wait for the prompt after interrupting a timed out command.
    pub interrupt_grace: Duration,
    pub cols: u16,
    pub rows: u16,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "bash".into(),
            args: vec!["--noprofile".into(), "--norc".into()],
            working_dir: None,
            command_timeout: Duration::from_secs(120),
            startup_timeout: Duration::from_secs(30),
            interrupt_grace: Duration::from_secs(5),
            cols: 1024,
            rows: 24,
        }
    }
}

/// Where cell code is staged and how it is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellConfig {
    /// File the cell code is written to before running.
    pub cell_path: PathBuf,
    /// File kernel-init code is written to after a restart.
    pub init_path: PathBuf,
    /// Command that reads code on stdin and runs it in the kernel.
    pub runner: String,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            cell_path: PathBuf::from("/tmp/exec_agent_cell.py"),
            init_path: PathBuf::from("/tmp/exec_agent_init.py"),
            runner: "execute_cli".into(),
        }
    }
}

/// What to do once the shell process has died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrashPolicy {
    /// Spawn a fresh shell on the next action.
    #[default]
    Respawn,
    /// Answer every later shell action with an error.
    Fail,
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown crash policy: {0} (expected `respawn` or `fail`)")]
    UnknownCrashPolicy(String),
}

impl FromStr for CrashPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "respawn" => Ok(Self::Respawn),
            "fail" => Ok(Self::Fail),
            other => Err(ConfigError::UnknownCrashPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for CrashPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respawn => f.write_str("respawn"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_policy_parse() {
        assert_eq!("respawn".parse::<CrashPolicy>().unwrap(), CrashPolicy::Respawn);
        assert_eq!(" FAIL ".parse::<CrashPolicy>().unwrap(), CrashPolicy::Fail);
        assert!("restart".parse::<CrashPolicy>().is_err());
        assert_eq!(CrashPolicy::default().to_string(), "respawn");
    }

    #[test]
    fn test_default_shell_is_plain_bash() {
        let config = ShellConfig::default();
        assert_eq!(config.program, "bash");
        assert_eq!(config.args, ["--noprofile", "--norc"]);
        assert!(config.command_timeout > config.interrupt_grace);
    }
}
