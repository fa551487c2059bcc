//! Entry payload encoding.
//!
//! The store treats payloads as opaque strings; this is the only place that
//! knows they are JSON arrays of entries.

use thiserror::Error;

use crate::engine::types::ConfigEntry;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode entries: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode entries: {0}")]
    Decode(serde_json::Error),
}

pub fn encode_entries(entries: &[ConfigEntry]) -> Result<String, CodecError> {
    serde_json::to_string(entries).map_err(CodecError::Encode)
}

pub fn decode_entries(payload: &str) -> Result<Vec<ConfigEntry>, CodecError> {
    serde_json::from_str(payload).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_entries("{not json"), Err(CodecError::Decode(_))));
        assert!(matches!(decode_entries(r#"{"key":"K1"}"#), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_payload_is_a_json_array() {
        let payload = encode_entries(&[ConfigEntry::new("K1", "v1", "d1")]).unwrap();
        assert_eq!(payload, r#"[{"key":"K1","value":"v1","description":"d1"}]"#);
        assert_eq!(decode_entries(&payload).unwrap()[0].key, "K1");
    }
}
