use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SessionError;

/// Values a handler keeps between requests of one session
pub type SessionData = Map<String, Value>;

/// Callbacks registered while rendering a state, keyed by their identifier
pub type Callbacks = Map<String, Value>;

/// What gets persisted for one `(session_id, state_id)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(default)]
    pub data: SessionData,
    #[serde(default)]
    pub callbacks: Callbacks,
}

/// Byte encoding of [`StatePayload`] used by a store
pub trait StateCodec: Send + Sync {
    fn encode(&self, payload: &StatePayload) -> Result<Vec<u8>, SessionError>;

    /// Decode a stored payload. Anything unreadable is a [`SessionError::State`].
    fn decode(&self, bytes: &[u8]) -> Result<StatePayload, SessionError>;
}

/// JSON encoding through `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl StateCodec for JsonCodec {
    fn encode(&self, payload: &StatePayload) -> Result<Vec<u8>, SessionError> {
        serde_json::to_vec(payload).map_err(|e| SessionError::Backend(format!("encode: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<StatePayload, SessionError> {
        serde_json::from_slice(bytes).map_err(|e| SessionError::State(format!("undecodable state: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec() {
        let mut payload = StatePayload::default();
        payload.data.insert("counter".into(), json!(3));
        payload.callbacks.insert("c1".into(), json!({"action": "increment"}));

        let bytes = JsonCodec.encode(&payload).unwrap();
        assert_eq!(JsonCodec.decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_missing_fields_default() {
        let payload = JsonCodec.decode(br#"{"data": {"a": 1}}"#).unwrap();
        assert_eq!(payload.data.get("a"), Some(&json!(1)));
        assert!(payload.callbacks.is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_state_error() {
        let err = JsonCodec.decode(b"\x00not json").unwrap_err();
        assert!(matches!(err, SessionError::State(_)));
        assert!(err.is_recoverable());
    }
}
