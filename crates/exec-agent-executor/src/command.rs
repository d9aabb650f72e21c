//! Shell command lines used to stage and run code.

use std::path::Path;

use thiserror::Error;

/// Terminator line of the heredoc that stages code.
pub const HEREDOC_DELIMITER: &str = "EOL";

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Runner command is empty")]
    EmptyRunner,
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
    #[error("Failed to quote command: {0}")]
    QuoteError(#[from] shlex::QuoteError),
}

/// Builds the command lines that move code through the shell.
///
/// Code is written to a file with a quoted heredoc (no expansion happens
/// inside it) and then piped into the runner.
#[derive(Debug, Clone)]
pub struct CodeDelivery {
    runner: String,
}

impl CodeDelivery {
    /// Create a builder for the given runner command.
    ///
    /// # Errors
    /// Returns error if the runner is blank.
    pub fn new<S: Into<String>>(runner: S) -> Result<Self, CommandBuildError> {
        let runner = runner.into();
        if runner.trim().is_empty() {
            return Err(CommandBuildError::EmptyRunner);
        }
        Ok(Self { runner })
    }

    /// Command that writes `code` verbatim to `path`.
    ///
    /// # Errors
    /// Returns error if the path cannot be quoted.
    pub fn write_file(&self, path: &Path, code: &str) -> Result<String, CommandBuildError> {
        let path = quote_path(path)?;
        Ok(format!(
            "cat > {path} <<'{HEREDOC_DELIMITER}'\n{code}\n{HEREDOC_DELIMITER}"
        ))
    }

    /// Command that feeds the file at `path` to the runner.
    ///
    /// # Errors
    /// Returns error if the path cannot be quoted.
    pub fn run_file(&self, path: &Path) -> Result<String, CommandBuildError> {
        let path = quote_path(path)?;
        Ok(format!("cat {path} | {}", self.runner))
    }
}

fn quote_path(path: &Path) -> Result<String, CommandBuildError> {
    let path = path
        .to_str()
        .ok_or_else(|| CommandBuildError::NonUtf8Path(path.to_string_lossy().into_owned()))?;
    Ok(shlex::try_quote(path)?.into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_write_file_uses_quoted_heredoc() {
        let delivery = CodeDelivery::new("execute_cli").unwrap();
        let cmd = delivery
            .write_file(Path::new("/tmp/cell.py"), "print('$HOME')")
            .unwrap();
        assert_eq!(cmd, "cat > /tmp/cell.py <<'EOL'\nprint('$HOME')\nEOL");
    }

    #[test]
    fn test_run_file_pipes_into_runner() {
        let delivery = CodeDelivery::new("execute_cli").unwrap();
        let cmd = delivery.run_file(Path::new("/tmp/cell.py")).unwrap();
        assert_eq!(cmd, "cat /tmp/cell.py | execute_cli");
    }

    #[test]
    fn test_paths_with_spaces_are_quoted() {
        let delivery = CodeDelivery::new("python3").unwrap();
        let cmd = delivery.run_file(&PathBuf::from("/tmp/my cells/a.py")).unwrap();
        assert_eq!(cmd, "cat '/tmp/my cells/a.py' | python3");
    }

    #[test]
    fn test_blank_runner_rejected() {
        assert!(matches!(
            CodeDelivery::new("  "),
            Err(CommandBuildError::EmptyRunner)
        ));
    }
}
