// ABOUTME: Serialization hooks that turn state slices into stored strings and back.
// ABOUTME: JsonCodec is the default; callers can plug in their own StateCodec.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while encoding or decoding a persisted value.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("codec error: {0}")]
    Custom(String),
}

/// Converts state values to and from their stored representation.
/// `deserialize(serialize(v))` must reproduce `v`.
pub trait StateCodec: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<String, CodecError>;

    fn deserialize(&self, raw: &str) -> Result<Value, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl StateCodec for JsonCodec {
    fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, raw: &str) -> Result<Value, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_codec_round_trips_state_shapes() {
        let codec = JsonCodec;
        let values = [
            json!({"counter": {"count": 100}}),
            json!({"nested": {"list": [1, "two", null, {"three": 3.5}]}}),
            json!("plain string"),
            json!(null),
            json!({}),
        ];

        for value in values {
            let raw = codec.serialize(&value).unwrap();
            assert_eq!(codec.deserialize(&raw).unwrap(), value);
        }
    }

    #[test]
    fn json_codec_rejects_corrupted_input() {
        let err = JsonCodec.deserialize(r#"{"count": 1"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
