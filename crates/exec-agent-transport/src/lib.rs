//! Transport layer for the execution agent.
//!
//! Provides:
//! - Wire protocol (one JSON action in, one JSON observation out)
//! - WebSocket listener (feature: websocket)

pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{DecodeError, TransportError, decode_action, encode_observation};
