//! Remote execution agent.
//!
//! Accepts actions from an orchestrator over WebSocket and runs them in one
//! persistent shell.
//!
//! Run with: cargo run -p exec-agent -- --port 8080

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use exec_agent_core::{CellConfig, CrashPolicy, ShellConfig};
use exec_agent_executor::CellExecutor;
use exec_agent_pty::PtyShellFactory;
use exec_agent_session::{ActionDispatcher, ManagedShell};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "exec-agent")]
#[command(version)]
#[command(about = "Runs orchestrator actions in a persistent shell")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "EXEC_AGENT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "EXEC_AGENT_PORT", default_value_t = 8080)]
    port: u16,

    /// Shell program
    #[arg(long, env = "EXEC_AGENT_SHELL", default_value = "bash")]
    shell: String,

    /// Working directory of the shell
    #[arg(long, env = "EXEC_AGENT_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Seconds a command may run before it is interrupted
    #[arg(long, env = "EXEC_AGENT_COMMAND_TIMEOUT", default_value_t = 120)]
    command_timeout: u64,

    /// Seconds to wait for the shell's first prompt
    #[arg(long, env = "EXEC_AGENT_STARTUP_TIMEOUT", default_value_t = 30)]
    startup_timeout: u64,

    /// Seconds to wait for the prompt after interrupting a command
    #[arg(long, env = "EXEC_AGENT_INTERRUPT_GRACE", default_value_t = 5)]
    interrupt_grace: u64,

    /// Command that runs cell code read from stdin
    #[arg(long, env = "EXEC_AGENT_RUNNER", default_value = "execute_cli")]
    runner: String,

    /// File cell code is staged in
    #[arg(long, env = "EXEC_AGENT_CELL_PATH", default_value = "/tmp/exec_agent_cell.py")]
    cell_path: PathBuf,

    /// File kernel init code is staged in
    #[arg(long, env = "EXEC_AGENT_INIT_PATH", default_value = "/tmp/exec_agent_init.py")]
    init_path: PathBuf,

    /// What to do when the shell dies: respawn or fail
    #[arg(long, env = "EXEC_AGENT_CRASH_POLICY", default_value_t = CrashPolicy::Respawn)]
    crash_policy: CrashPolicy,
}

impl Args {
    fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            program: self.shell.clone(),
            working_dir: self.workdir.clone(),
            command_timeout: Duration::from_secs(self.command_timeout),
            startup_timeout: Duration::from_secs(self.startup_timeout),
            interrupt_grace: Duration::from_secs(self.interrupt_grace),
            ..ShellConfig::default()
        }
    }

    fn cell_config(&self) -> CellConfig {
        CellConfig {
            cell_path: self.cell_path.clone(),
            init_path: self.init_path.clone(),
            runner: self.runner.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    let cells = CellExecutor::new(args.cell_config()).context("Invalid cell runner")?;
    let shell = ManagedShell::start(PtyShellFactory::new(args.shell_config()), args.crash_policy)
        .await
        .context("Failed to start shell")?;
    tracing::info!(shell = %args.shell, crash_policy = %args.crash_policy, "Shell ready");

    let dispatcher = Arc::new(ActionDispatcher::new(shell, cells));

    let served = exec_agent_transport::websocket::serve(addr, Arc::clone(&dispatcher), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    })
    .await;

    if let Err(e) = dispatcher.close().await {
        tracing::warn!("Failed to close shell: {e}");
    }
    served.context("Server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["exec-agent"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.crash_policy, CrashPolicy::Respawn);

        let shell = args.shell_config();
        assert_eq!(shell.command_timeout, Duration::from_secs(120));
        assert_eq!(shell.args, ["--noprofile", "--norc"]);
        assert_eq!(args.cell_config(), CellConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "exec-agent",
            "--port",
            "9000",
            "--crash-policy",
            "fail",
            "--command-timeout",
            "7",
        ])
        .unwrap();

        assert_eq!(args.port, 9000);
        assert_eq!(args.crash_policy, CrashPolicy::Fail);
        assert_eq!(args.shell_config().command_timeout, Duration::from_secs(7));
    }
}
