//! Typed value serialization
//!
//! Channel values and pending writes are stored as `(type_tag, bytes)` pairs
//! so a reader knows how to decode a blob without guessing.

use crate::checkpoint::CheckpointMetadata;
use crate::{Error, Result};
use serde_json::Value;

/// Tag for a channel that has a version but no value
pub const EMPTY_TYPE: &str = "empty";

pub const JSON_TYPE: &str = "json";
pub const NULL_TYPE: &str = "null";
pub const BYTES_TYPE: &str = "bytes";

/// Encodes values into tagged byte blobs and back
pub trait Serializer: Send + Sync {
    fn dumps_typed(&self, value: &Value) -> Result<(String, Vec<u8>)>;

    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<Value>;
}

/// JSON serializer that also reads `null` and raw `bytes` blobs
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlusSerializer;

impl Serializer for JsonPlusSerializer {
    fn dumps_typed(&self, value: &Value) -> Result<(String, Vec<u8>)> {
        Ok((JSON_TYPE.to_string(), serde_json::to_vec(value)?))
    }

    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<Value> {
        match type_tag {
            JSON_TYPE => Ok(serde_json::from_slice(data)?),
            NULL_TYPE => Ok(Value::Null),
            BYTES_TYPE => Ok(Value::Array(
                data.iter().map(|b| Value::from(*b)).collect(),
            )),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

/// Metadata as JSON text, with NUL escapes removed
///
/// MySQL JSON columns reject `\u0000`, so those characters are dropped before
/// the text reaches the database.
pub fn dump_metadata(metadata: &CheckpointMetadata) -> Result<String> {
    let text = serde_json::to_string(metadata)?;
    Ok(text.replace("\\u0000", ""))
}

pub fn load_metadata(text: &str) -> Result<CheckpointMetadata> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip_keeps_structure() {
        let serde = JsonPlusSerializer;
        let value = json!({"a": [1, 2, 3], "b": null, "c": "text"});

        let (tag, data) = serde.dumps_typed(&value).unwrap();
        assert_eq!(tag, "json");
        assert_eq!(serde.loads_typed(&tag, &data).unwrap(), value);
    }

    #[test]
    fn test_loads_null_and_bytes() {
        let serde = JsonPlusSerializer;
        assert_eq!(serde.loads_typed("null", &[]).unwrap(), Value::Null);
        assert_eq!(serde.loads_typed("bytes", &[1, 2]).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let serde = JsonPlusSerializer;
        let err = serde.loads_typed("msgpack", &[0x90]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(t) if t == "msgpack"));
    }

    #[test]
    fn test_dump_metadata_strips_nul() {
        let mut metadata = CheckpointMetadata::new();
        metadata.insert("my_key".to_string(), json!("\u{0000}abc"));

        let text = dump_metadata(&metadata).unwrap();
        assert!(!text.contains("\\u0000"));
        assert_eq!(load_metadata(&text).unwrap()["my_key"], json!("abc"));
    }
}
