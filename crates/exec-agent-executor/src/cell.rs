//! Code cell execution on top of a shell session.

use std::path::Path;

use exec_agent_core::{CellConfig, CommandOutput, CommandRunner, ShellError};
use thiserror::Error;

use crate::{
    command::{CodeDelivery, CommandBuildError},
    install::{
        InstallOutcome, KERNEL_RESTART_FAILED_NOTE, KERNEL_RESTARTED_NOTE,
        PACKAGE_ALREADY_INSTALLED_MESSAGE, PACKAGE_INSTALLED_MESSAGE, RESTART_KERNEL_CODE,
        classify_install_output, restart_succeeded,
    },
};

/// Cell execution error.
#[derive(Debug, Error)]
pub enum CellError {
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Command(#[from] CommandBuildError),
}

/// Result of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellOutput {
    pub content: String,
    pub code: String,
}

/// Runs code cells through the configured runner.
#[derive(Debug, Clone)]
pub struct CellExecutor {
    config: CellConfig,
    delivery: CodeDelivery,
}

impl CellExecutor {
    /// Create an executor.
    ///
    /// # Errors
    /// Returns error if the configured runner is blank.
    pub fn new(config: CellConfig) -> Result<Self, CommandBuildError> {
        let delivery = CodeDelivery::new(config.runner.clone())?;
        Ok(Self { config, delivery })
    }

    #[must_use]
    pub const fn config(&self) -> &CellConfig {
        &self.config
    }

    /// Execute `code` as one cell.
    ///
    /// Install cells get their output replaced by a fixed status message.
    /// When pip asks for a kernel restart, the kernel is restarted and
    /// `kernel_init_code` (if any) is run again.
    ///
    /// # Errors
    /// Returns error if any shell command fails.
    pub async fn execute<R>(
        &self,
        runner: &mut R,
        code: &str,
        kernel_init_code: Option<&str>,
    ) -> Result<CellOutput, CellError>
    where
        R: CommandRunner + ?Sized,
    {
        let output = self.run_code(runner, &self.config.cell_path, code).await?;

        let content = match classify_install_output(code, &output.output) {
            InstallOutcome::Unrecognized => output.output,
            InstallOutcome::Installed { needs_restart } => {
                let mut content = PACKAGE_INSTALLED_MESSAGE.to_string();
                if needs_restart {
                    content.push_str(self.restart_kernel(runner).await?);
                    if let Some(init) = kernel_init_code.filter(|c| !c.is_empty()) {
                        tracing::debug!("Re-running kernel init code");
                        self.run_code(runner, &self.config.init_path, init).await?;
                    }
                }
                content
            }
            InstallOutcome::AlreadySatisfied { package } => {
                tracing::debug!(package, "Package already installed");
                PACKAGE_ALREADY_INSTALLED_MESSAGE.to_string()
            }
        };

        Ok(CellOutput {
            content,
            code: code.to_string(),
        })
    }

    async fn restart_kernel<R>(&self, runner: &mut R) -> Result<&'static str, CellError>
    where
        R: CommandRunner + ?Sized,
    {
        let restart = self
            .run_code(runner, &self.config.cell_path, RESTART_KERNEL_CODE)
            .await?;
        if restart_succeeded(&restart.output) {
            tracing::info!("Kernel restarted after package install");
            Ok(KERNEL_RESTARTED_NOTE)
        } else {
            tracing::warn!(output = %restart.output, "Kernel restart failed");
            Ok(KERNEL_RESTART_FAILED_NOTE)
        }
    }

    /// Stage `code` at `path` and run it.
    async fn run_code<R>(
        &self,
        runner: &mut R,
        path: &Path,
        code: &str,
    ) -> Result<CommandOutput, CellError>
    where
        R: CommandRunner + ?Sized,
    {
        runner.execute(&self.delivery.write_file(path, code)?).await?;
        Ok(runner.execute(&self.delivery.run_file(path)?).await?)
    }
}
