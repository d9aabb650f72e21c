//! Shell lifecycle management with crash handling.

use async_trait::async_trait;
use exec_agent_core::{CommandOutput, CommandRunner, CrashPolicy, ShellError, ShellFactory};

enum ShellState<S> {
    Ready(S),
    Crashed,
    Closed,
}

/// A shell that survives process death according to a [`CrashPolicy`].
///
/// The command that observes the death always fails with
/// [`ShellError::Exited`]; what happens to later commands depends on the
/// policy.
pub struct ManagedShell<F>
where
    F: ShellFactory,
{
    factory: F,
    policy: CrashPolicy,
    state: ShellState<F::Shell>,
    respawns: u32,
}

impl<F> ManagedShell<F>
where
    F: ShellFactory,
{
    /// Spawn the initial shell.
    ///
    /// # Errors
    /// Returns error if the first shell cannot be started.
    pub async fn start(factory: F, policy: CrashPolicy) -> Result<Self, ShellError> {
        let shell = factory.spawn().await?;
        Ok(Self {
            factory,
            policy,
            state: ShellState::Ready(shell),
            respawns: 0,
        })
    }

    #[must_use]
    pub const fn policy(&self) -> CrashPolicy {
        self.policy
    }

    /// Number of shells spawned to replace crashed ones.
    #[must_use]
    pub const fn respawns(&self) -> u32 {
        self.respawns
    }

    async fn ready_shell(&mut self) -> Result<&mut F::Shell, ShellError> {
        let died = match &mut self.state {
            ShellState::Ready(shell) => !shell.is_alive(),
            _ => false,
        };
        if died {
            tracing::warn!("Shell process died between commands");
            self.state = ShellState::Crashed;
        }

        if matches!(self.state, ShellState::Crashed) {
            match self.policy {
                CrashPolicy::Fail => return Err(ShellError::Exited),
                CrashPolicy::Respawn => {
                    let shell = self.factory.spawn().await?;
                    self.respawns += 1;
                    tracing::info!(respawns = self.respawns, "Respawned shell");
                    self.state = ShellState::Ready(shell);
                }
            }
        }

        match &mut self.state {
            ShellState::Ready(shell) => Ok(shell),
            ShellState::Crashed => Err(ShellError::Exited),
            ShellState::Closed => Err(ShellError::Closed),
        }
    }
}

#[async_trait]
impl<F> CommandRunner for ManagedShell<F>
where
    F: ShellFactory,
{
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let shell = self.ready_shell().await?;
        let result = shell.execute(command).await;
        if matches!(result, Err(ShellError::Exited)) {
            tracing::warn!(policy = %self.policy, "Shell process exited");
            self.state = ShellState::Crashed;
        }
        result
    }

    fn is_alive(&mut self) -> bool {
        match &mut self.state {
            ShellState::Ready(shell) => shell.is_alive(),
            ShellState::Crashed => self.policy == CrashPolicy::Respawn,
            ShellState::Closed => false,
        }
    }

    async fn close(&mut self) -> Result<(), ShellError> {
        let state = std::mem::replace(&mut self.state, ShellState::Closed);
        if let ShellState::Ready(mut shell) = state {
            shell.close().await?;
        }
        Ok(())
    }
}
