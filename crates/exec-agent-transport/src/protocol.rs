//! Wire protocol between the orchestrator and the agent.

use exec_agent_core::{ActionEnvelope, ActionId, ObservationEnvelope};
use thiserror::Error;

/// Boxed error from the underlying socket.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Inbound message that could not be decoded into an action.
#[derive(Debug, Error)]
#[error("Invalid action: {source}")]
pub struct DecodeError {
    /// `id` of the message, when it could still be read.
    pub parent: Option<ActionId>,
    source: serde_json::Error,
}

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("Failed to encode observation: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("WebSocket error: {0}")]
    Socket(#[source] BoxError),
}

/// Decode one inbound text message.
///
/// # Errors
/// Returns error if the message is not a known action.
pub fn decode_action(text: &str) -> Result<ActionEnvelope, DecodeError> {
    serde_json::from_str(text).map_err(|source| DecodeError {
        parent: recover_id(text),
        source,
    })
}

fn recover_id(text: &str) -> Option<ActionId> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("id")?
        .as_i64()
}

/// Encode one outbound observation.
///
/// # Errors
/// Returns error if serialization fails.
pub fn encode_observation(envelope: &ObservationEnvelope) -> Result<String, TransportError> {
    Ok(serde_json::to_string(envelope)?)
}

#[cfg(test)]
mod tests {
    use exec_agent_core::{Action, Observation};

    use super::*;

    #[test]
    fn test_decode_run_action() {
        let envelope = decode_action(
            r#"{"id": 3, "action": "run", "args": {"command": "ls", "thought": ""}, "message": "Running ls"}"#,
        )
        .unwrap();

        assert_eq!(envelope.id, 3);
        assert!(matches!(envelope.action, Action::Run(ref args) if args.command == "ls"));
    }

    #[test]
    fn test_unknown_action_keeps_id() {
        let err = decode_action(r#"{"id": 9, "action": "teleport", "args": {}}"#).unwrap_err();
        assert_eq!(err.parent, Some(9));
        assert!(err.to_string().starts_with("Invalid action: "));
    }

    #[test]
    fn test_garbage_has_no_parent() {
        let err = decode_action("not json").unwrap_err();
        assert_eq!(err.parent, None);

        let err = decode_action(r#"{"id": "x", "action": "run"}"#).unwrap_err();
        assert_eq!(err.parent, None);
    }

    #[test]
    fn test_encode_observation() {
        let json = encode_observation(&ObservationEnvelope::new(
            Some(4),
            Observation::error("boom"),
        ))
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"observation": "error", "parent": 4, "content": "boom"})
        );
    }
}
