//! Persistent interactive shell over a PTY.
//!
//! Provides:
//! - `ShellSession` - One shell process with prompt-synchronized command execution
//! - `PtyShellFactory` - Spawns sessions from a `ShellConfig`
//! - Prompt detection and output parsing

pub mod prompt;
pub mod session;
pub mod shell;

pub use session::{PtyShellFactory, SessionState, ShellSession};
pub use shell::{resolve_executable_path, resolve_shell};
