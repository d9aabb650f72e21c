//! Routes actions to their handlers.

use exec_agent_core::{
    Action, ActionEnvelope, CommandRunner, Observation, ObservationEnvelope, ShellError,
    event::{CmdRunArgs, IPythonRunCellArgs},
};
use exec_agent_executor::{CellError, CellExecutor};
use thiserror::Error;
use tokio::sync::Mutex;

/// Dispatch error. Reported to the orchestrator as an error observation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unsupported action: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Cell(#[from] CellError),
}

/// Maps each action to the observation it produces.
///
/// The shell is locked for the whole handling of one action, so a
/// multi-command cell never interleaves with another caller's commands.
pub struct ActionDispatcher<R>
where
    R: CommandRunner,
{
    shell: Mutex<R>,
    cells: CellExecutor,
}

impl<R> ActionDispatcher<R>
where
    R: CommandRunner,
{
    /// Create a dispatcher that owns `shell`.
    #[must_use]
    pub fn new(shell: R, cells: CellExecutor) -> Self {
        Self {
            shell: Mutex::new(shell),
            cells,
        }
    }

    /// Handle one action. Always yields exactly one observation, linked to
    /// the action through `parent`.
    pub async fn dispatch(&self, envelope: ActionEnvelope) -> ObservationEnvelope {
        let ActionEnvelope { id, action } = envelope;
        let kind = action.kind();
        tracing::debug!(action_id = id, kind, "Dispatching action");

        let observation = match self.handle(action).await {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(action_id = id, kind, "Action failed: {e}");
                Observation::error(e.to_string())
            }
        };
        ObservationEnvelope::new(Some(id), observation)
    }

    async fn handle(&self, action: Action) -> Result<Observation, DispatchError> {
        match action {
            Action::Run(args) => self.run(args).await,
            Action::RunIpython(args) => self.run_ipython(args).await,
            Action::Recall(_)
            | Action::BrowseInteractive(_)
            | Action::Browse(_)
            | Action::Read(_)
            | Action::Write(_) => Err(DispatchError::Unsupported(action.kind())),
        }
    }

    async fn run(&self, args: CmdRunArgs) -> Result<Observation, DispatchError> {
        let mut shell = self.shell.lock().await;
        let output = shell.execute(&args.command).await?;
        Ok(Observation::cmd_output(
            args.command,
            output.output,
            output.exit_code,
        ))
    }

    async fn run_ipython(&self, args: IPythonRunCellArgs) -> Result<Observation, DispatchError> {
        let mut shell = self.shell.lock().await;
        let cell = self
            .cells
            .execute(&mut *shell, &args.code, args.kernel_init_code.as_deref())
            .await?;
        Ok(Observation::cell_result(cell.code, cell.content))
    }

    /// Close the shell. Later shell actions fail.
    ///
    /// # Errors
    /// Returns error if the shell process cannot be terminated.
    pub async fn close(&self) -> Result<(), ShellError> {
        self.shell.lock().await.close().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use exec_agent_core::{
        CellConfig, CommandOutput,
        event::{AgentRecallArgs, FileReadArgs},
    };

    use super::*;

    /// Echo shell: `bad` yields undecodable output, anything else echoes.
    #[derive(Default)]
    struct EchoShell {
        commands: Vec<String>,
        closed: bool,
    }

    #[async_trait]
    impl CommandRunner for EchoShell {
        async fn execute(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
            if self.closed {
                return Err(ShellError::Closed);
            }
            self.commands.push(command.to_string());
            match command {
                "bad" => Err(ShellError::Decode),
                "false" => Ok(CommandOutput::new("", "1")),
                c if c.starts_with("cat > ") => Ok(CommandOutput::new("", "0")),
                c if c.starts_with("cat ") => Ok(CommandOutput::new("Successfully installed foo-1.0", "0")),
                c => Ok(CommandOutput::new(c.trim_start_matches("echo "), "0")),
            }
        }

        async fn close(&mut self) -> Result<(), ShellError> {
            self.closed = true;
            Ok(())
        }
    }

    fn dispatcher() -> ActionDispatcher<EchoShell> {
        ActionDispatcher::new(
            EchoShell::default(),
            CellExecutor::new(CellConfig::default()).unwrap(),
        )
    }

    fn run(id: i64, command: &str) -> ActionEnvelope {
        ActionEnvelope {
            id,
            action: Action::Run(CmdRunArgs {
                command: command.into(),
                thought: String::new(),
            }),
        }
    }

    #[tokio::test]
    async fn test_run_links_parent_and_reports_exit_code() {
        let dispatcher = dispatcher();

        for id in [11, 12] {
            let reply = dispatcher.dispatch(run(id, "echo hi")).await;
            assert_eq!(reply.parent, Some(id));
            assert_eq!(reply.observation, Observation::cmd_output("echo hi", "hi", "0"));
        }

        let reply = dispatcher.dispatch(run(13, "false")).await;
        assert_eq!(reply.observation, Observation::cmd_output("false", "", "1"));
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported_and_shell_stays_usable() {
        let dispatcher = dispatcher();

        let reply = dispatcher.dispatch(run(1, "bad")).await;
        assert_eq!(reply.parent, Some(1));
        assert_eq!(
            reply.observation,
            Observation::error("Command output could not be decoded as utf-8")
        );

        let reply = dispatcher.dispatch(run(2, "echo ok")).await;
        assert_eq!(reply.observation.content(), "ok");
    }

    #[tokio::test]
    async fn test_cell_action_produces_cell_result() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(ActionEnvelope {
                id: 5,
                action: Action::RunIpython(IPythonRunCellArgs {
                    code: "pip install foo".into(),
                    thought: String::new(),
                    kernel_init_code: None,
                }),
            })
            .await;

        assert_eq!(reply.parent, Some(5));
        assert_eq!(
            reply.observation,
            Observation::cell_result("pip install foo", "[Package installed successfully]")
        );
        assert_eq!(dispatcher.shell.lock().await.commands.len(), 2);
    }

    #[tokio::test]
    async fn test_unhandled_actions_are_unsupported() {
        let dispatcher = dispatcher();
        let recall = dispatcher
            .dispatch(ActionEnvelope {
                id: 7,
                action: Action::Recall(AgentRecallArgs { query: "q".into() }),
            })
            .await;
        assert_eq!(recall.parent, Some(7));
        assert_eq!(recall.observation, Observation::error("Unsupported action: recall"));

        let read = dispatcher
            .dispatch(ActionEnvelope {
                id: 8,
                action: Action::Read(FileReadArgs {
                    path: "/etc/hosts".into(),
                    start: 0,
                    end: -1,
                }),
            })
            .await;
        assert_eq!(read.observation, Observation::error("Unsupported action: read"));
        assert!(dispatcher.shell.lock().await.commands.is_empty());
    }

    #[tokio::test]
    async fn test_close_fails_later_commands() {
        let dispatcher = dispatcher();
        dispatcher.close().await.unwrap();
        let reply = dispatcher.dispatch(run(3, "echo hi")).await;
        assert_eq!(reply.observation, Observation::error("Shell session is closed"));
    }
}
