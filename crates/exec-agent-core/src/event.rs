//! Actions received from the orchestrator and the observations sent back.

use serde::{Deserialize, Serialize};

/// Action identifier assigned by the orchestrator.
pub type ActionId = i64;

/// `command_id` reported for every shell command observation.
pub const NO_COMMAND_ID: i64 = -1;

/// An inbound action together with its identifier.
///
/// Fields the agent does not use (`message`, `timestamp`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub id: ActionId,
    #[serde(flatten)]
    pub action: Action,
}

/// Unit of work requested by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum Action {
    /// Run a single command line in the shell.
    Run(CmdRunArgs),
    /// Run a code cell through the kernel runner.
    RunIpython(IPythonRunCellArgs),
    Recall(AgentRecallArgs),
    BrowseInteractive(BrowseInteractiveArgs),
    Browse(BrowseUrlArgs),
    Read(FileReadArgs),
    Write(FileWriteArgs),
}

impl Action {
    /// Wire discriminant of this action.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::RunIpython(_) => "run_ipython",
            Self::Recall(_) => "recall",
            Self::BrowseInteractive(_) => "browse_interactive",
            Self::Browse(_) => "browse",
            Self::Read(_) => "read",
            Self::Write(_) => "write",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdRunArgs {
    pub command: String,
    #[serde(default)]
    pub thought: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IPythonRunCellArgs {
    pub code: String,
    #[serde(default)]
    pub thought: String,
    /// Code that re-initializes the kernel after a restart.
    #[serde(default)]
    pub kernel_init_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecallArgs {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseInteractiveArgs {
    #[serde(default)]
    pub browser_actions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseUrlArgs {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadArgs {
    pub path: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "whole_file")]
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWriteArgs {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "whole_file")]
    pub end: i64,
}

const fn whole_file() -> i64 {
    -1
}

/// An outbound observation linked to the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEnvelope {
    /// Identifier of the originating action; `None` only when the inbound
    /// message was too malformed to carry one.
    pub parent: Option<ActionId>,
    #[serde(flatten)]
    pub observation: Observation,
}

impl ObservationEnvelope {
    #[must_use]
    pub const fn new(parent: Option<ActionId>, observation: Observation) -> Self {
        Self {
            parent,
            observation,
        }
    }
}

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "observation")]
pub enum Observation {
    #[serde(rename = "run")]
    CmdOutput {
        content: String,
        extras: CmdOutputExtras,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "content")]
        message: String,
    },
    #[serde(rename = "run_ipython")]
    IPythonRunCell {
        content: String,
        extras: IPythonRunCellExtras,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdOutputExtras {
    pub command_id: i64,
    pub command: String,
    pub exit_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IPythonRunCellExtras {
    pub code: String,
}

impl Observation {
    /// Output of a shell command.
    #[must_use]
    pub fn cmd_output(
        command: impl Into<String>,
        content: impl Into<String>,
        exit_code: impl Into<String>,
    ) -> Self {
        Self::CmdOutput {
            content: content.into(),
            extras: CmdOutputExtras {
                command_id: NO_COMMAND_ID,
                command: command.into(),
                exit_code: exit_code.into(),
            },
        }
    }

    /// Result of a code cell.
    #[must_use]
    pub fn cell_result(code: impl Into<String>, content: impl Into<String>) -> Self {
        Self::IPythonRunCell {
            content: content.into(),
            extras: IPythonRunCellExtras { code: code.into() },
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Text body of the observation.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::CmdOutput { content, .. } | Self::IPythonRunCell { content, .. } => content,
            Self::Error { message } => message,
        }
    }
}
