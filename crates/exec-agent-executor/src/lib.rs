//! Code cell execution over a shell session.
//!
//! Provides:
//! - `CellExecutor` - Stages code through the shell and runs it in the kernel
//! - Package install recognition on cell output
//! - Code delivery command building

pub mod cell;
pub mod command;
pub mod install;

pub use cell::{CellError, CellExecutor, CellOutput};
pub use command::{CodeDelivery, CommandBuildError};
pub use install::{InstallOutcome, classify_install_output};
