//! Shell lifecycle and action dispatch for the execution agent.
//!
//! Provides:
//! - `ManagedShell` - Keeps a shell available across process crashes
//! - `ActionDispatcher` - Turns actions into observations

pub mod dispatcher;
pub mod manager;

pub use dispatcher::{ActionDispatcher, DispatchError};
pub use manager::ManagedShell;
