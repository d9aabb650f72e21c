//! Persistent interactive shell driven through a PTY.

use std::{
    io::{self, Read, Write},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use exec_agent_core::{CommandOutput, CommandRunner, ShellConfig, ShellError, ShellFactory};
use portable_pty::{Child, CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use tokio::{
    sync::mpsc,
    time::{Instant, timeout_at},
};
use uuid::Uuid;

use crate::{prompt, shell::resolve_shell};

const READ_CHUNK: usize = 4096;
const INTERRUPT: &[u8] = b"\x03";

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Lifecycle of a [`ShellSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting at a prompt for the next command.
    Ready,
    /// The process exited or was killed after becoming unresponsive.
    Dead,
    /// Closed on request.
    Closed,
}

enum Wait {
    Prompt(usize),
    Expired,
    Eof,
}

/// One long-lived shell process.
///
/// The shell is configured so that every command's captured output ends
/// with its exit status (see [`prompt::PROMPT_COMMAND`]). Commands run one
/// at a time; `&mut self` on [`CommandRunner::execute`] enforces that.
pub struct ShellSession {
    id: Uuid,
    config: ShellConfig,
    writer: SharedWriter,
    output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
    buffer: Vec<u8>,
    state: SessionState,
}

impl ShellSession {
    /// Spawn the shell and wait for its first prompt.
    ///
    /// # Errors
    /// Returns error if the shell cannot be started or never shows a prompt.
    pub async fn spawn(config: ShellConfig) -> Result<Self, ShellError> {
        let program = resolve_shell(&config.program).await?;

        let pty_system = NativePtySystem::default();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(spawn_error)?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&config.args);
        if let Some(dir) = &config.working_dir {
            cmd.cwd(dir);
        }
        cmd.env("TERM", "dumb");
        cmd.env("PS1", prompt::PS1);
        cmd.env("PS2", "");
        cmd.env("PROMPT_COMMAND", prompt::PROMPT_COMMAND);

        let child = pair.slave.spawn_command(cmd).map_err(spawn_error)?;
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(spawn_error)?;
        let writer = pair.master.take_writer().map_err(spawn_error)?;

        let id = Uuid::new_v4();
        let (tx, output_rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name(format!("shell-reader-{id}"))
            .spawn(move || pump_output(reader, &tx))?;

        tracing::debug!(shell_id = %id, shell = %program.display(), "Spawned shell");

        let mut session = Self {
            id,
            config,
            writer: Arc::new(Mutex::new(writer)),
            output_rx,
            child,
            _master: pair.master,
            buffer: Vec::new(),
            state: SessionState::Ready,
        };
        session.wait_for_first_prompt().await?;
        session.execute(prompt::READLINE_SETUP).await?;
        Ok(session)
    }

    /// Session identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Raw bytes of the most recent command, up to its prompt.
    #[must_use]
    pub fn last_output(&self) -> &[u8] {
        &self.buffer
    }

    async fn wait_for_first_prompt(&mut self) -> Result<(), ShellError> {
        let deadline = Instant::now() + self.config.startup_timeout;
        match self.wait_for_prompt(deadline).await {
            Wait::Prompt(_) => {
                self.buffer.clear();
                tracing::info!(shell_id = %self.id, "Shell ready");
                Ok(())
            }
            Wait::Expired => {
                self.kill();
                Err(ShellError::StartupTimeout(self.config.startup_timeout))
            }
            Wait::Eof => {
                self.state = SessionState::Dead;
                Err(ShellError::Exited)
            }
        }
    }

    async fn wait_for_prompt(&mut self, deadline: Instant) -> Wait {
        loop {
            if let Some(start) = prompt::prompt_start(&self.buffer) {
                return Wait::Prompt(start);
            }
            match timeout_at(deadline, self.output_rx.recv()).await {
                Ok(Some(chunk)) => {
                    tracing::trace!(shell_id = %self.id, bytes = chunk.len(), "Shell output");
                    self.buffer.extend_from_slice(&chunk);
                }
                Ok(None) => return Wait::Eof,
                Err(_) => return Wait::Expired,
            }
        }
    }

    /// Drop output that arrived after the last prompt so it cannot leak
    /// into the next command's result.
    fn discard_pending_output(&mut self) {
        let mut dropped = 0;
        while let Ok(chunk) = self.output_rx.try_recv() {
            dropped += chunk.len();
        }
        if dropped > 0 {
            tracing::debug!(shell_id = %self.id, bytes = dropped, "Discarded stray shell output");
        }
    }

    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), ShellError> {
        let writer = Arc::clone(&self.writer);
        let result = tokio::task::spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| io::Error::other("PTY writer poisoned"))?;
            writer.write_all(&bytes)?;
            writer.flush()
        })
        .await
        .map_err(io::Error::other)?;

        if let Err(e) = result {
            tracing::warn!(shell_id = %self.id, "Failed to write to shell: {e}");
            self.state = SessionState::Dead;
            return Err(ShellError::Exited);
        }
        Ok(())
    }

    async fn recover_from_timeout(&mut self) {
        tracing::warn!(
            shell_id = %self.id,
            timeout_secs = self.config.command_timeout.as_secs(),
            "Command timed out, interrupting"
        );
        self.buffer.clear();
        if self.send(INTERRUPT.to_vec()).await.is_err() {
            return;
        }

        let deadline = Instant::now() + self.config.interrupt_grace;
        match self.wait_for_prompt(deadline).await {
            Wait::Prompt(_) => {
                self.buffer.clear();
                tracing::debug!(shell_id = %self.id, "Shell recovered after interrupt");
            }
            Wait::Expired => {
                tracing::warn!(shell_id = %self.id, "Shell unresponsive after interrupt, killing");
                self.kill();
            }
            Wait::Eof => self.state = SessionState::Dead,
        }
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!(shell_id = %self.id, "Kill failed: {e}");
        }
        self.state = SessionState::Dead;
    }

    fn ensure_ready(&self) -> Result<(), ShellError> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Dead => Err(ShellError::Exited),
            SessionState::Closed => Err(ShellError::Closed),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        self.ensure_ready()?;
        tracing::info!(shell_id = %self.id, command, "Received command");

        self.discard_pending_output();
        self.buffer.clear();
        self.send(format!("{command}\n").into_bytes()).await?;

        let deadline = Instant::now() + self.config.command_timeout;
        match self.wait_for_prompt(deadline).await {
            Wait::Prompt(start) => {
                self.buffer.truncate(start);
                let Some(text) = prompt::decode_output(&self.buffer) else {
                    tracing::warn!(shell_id = %self.id, command, "Command output is not valid utf-8");
                    return Err(ShellError::Decode);
                };
                let output = prompt::parse_command_output(&text);
                tracing::debug!(shell_id = %self.id, exit_code = %output.exit_code, "Command finished");
                Ok(output)
            }
            Wait::Expired => {
                self.recover_from_timeout().await;
                Err(ShellError::Timeout(self.config.command_timeout))
            }
            Wait::Eof => {
                tracing::warn!(shell_id = %self.id, "Shell output closed");
                self.state = SessionState::Dead;
                Err(ShellError::Exited)
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        if self.state != SessionState::Ready {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::warn!(shell_id = %self.id, exit_code = status.exit_code(), "Shell process exited");
                self.state = SessionState::Dead;
                false
            }
            Err(e) => {
                tracing::warn!(shell_id = %self.id, "Failed to poll shell process: {e}");
                self.state = SessionState::Dead;
                false
            }
        }
    }

    async fn close(&mut self) -> Result<(), ShellError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let running = self.state == SessionState::Ready && self.child.try_wait()?.is_none();
        self.state = SessionState::Closed;
        if running {
            self.child.kill()?;
        }
        tracing::info!(shell_id = %self.id, "Shell session closed");
        Ok(())
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if self.state == SessionState::Ready {
            let _ = self.child.kill();
        }
    }
}

fn pump_output(mut reader: Box<dyn Read + Send>, tx: &mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            // EIO once the shell side of the PTY is gone
            Err(e) => {
                tracing::debug!("PTY read ended: {e}");
                break;
            }
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn spawn_error(e: impl std::fmt::Display) -> ShellError {
    ShellError::Spawn(e.to_string())
}

/// Spawns [`ShellSession`]s from a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct PtyShellFactory {
    config: ShellConfig,
}

impl PtyShellFactory {
    #[must_use]
    pub const fn new(config: ShellConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ShellFactory for PtyShellFactory {
    type Shell = ShellSession;

    async fn spawn(&self) -> Result<ShellSession, ShellError> {
        ShellSession::spawn(self.config.clone()).await
    }
}
