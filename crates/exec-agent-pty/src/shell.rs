//! Shell executable resolution.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use exec_agent_core::ShellError;

/// Resolve an executable by name.
///
/// The search order is:
/// 1. Explicit paths (absolute or containing a separator).
/// 2. The current process PATH via `which`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    which_async(executable).await
}

async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

/// Resolve the configured shell program.
///
/// # Errors
/// Returns [`ShellError::Spawn`] if the program cannot be found.
pub async fn resolve_shell(program: &str) -> Result<PathBuf, ShellError> {
    let path = resolve_executable_path(program)
        .await
        .ok_or_else(|| ShellError::Spawn(format!("Executable not found: {program}")))?;
    if !is_bash(&path) {
        tracing::warn!(
            shell = %path.display(),
            "Shell is not bash; prompt and exit status hooks may not apply"
        );
    }
    Ok(path)
}

/// Whether `path` names bash, the only shell the prompt hooks are written for.
#[must_use]
pub fn is_bash(path: &Path) -> bool {
    path.file_name() == Some(OsStr::new("bash"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_name_does_not_resolve() {
        assert_eq!(resolve_executable_path("  ").await, None);
    }

    #[tokio::test]
    async fn test_missing_explicit_path() {
        assert_eq!(
            resolve_executable_path("/definitely/not/here/bash").await,
            None
        );
        let err = resolve_shell("/definitely/not/here/bash").await.unwrap_err();
        assert!(matches!(err, ShellError::Spawn(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_resolves_sh_on_path() {
        if cfg!(unix) {
            let sh = resolve_executable_path("sh").await.unwrap();
            assert!(sh.is_absolute());
        }
    }

    #[test]
    fn test_is_bash() {
        assert!(is_bash(Path::new("/usr/bin/bash")));
        assert!(!is_bash(Path::new("/bin/zsh")));
    }
}
