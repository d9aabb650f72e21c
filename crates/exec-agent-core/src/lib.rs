//! Core abstractions for the execution agent.
//!
//! This crate provides the fundamental building blocks:
//! - `Action` / `Observation` - The message model exchanged with the orchestrator
//! - `CommandRunner` / `ShellFactory` - Sequential access to a shell
//! - `ShellConfig` / `CellConfig` - Runtime configuration

pub mod config;
pub mod event;
pub mod traits;

pub use config::{CellConfig, CrashPolicy, ShellConfig};
pub use event::{Action, ActionEnvelope, ActionId, Observation, ObservationEnvelope};
pub use traits::{CommandOutput, CommandRunner, ShellError, ShellFactory};
