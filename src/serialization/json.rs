//! JSON serializer.

use super::{Format, Serializer};
use crate::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Pretty-printed JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn format(&self) -> Format {
        Format::Json
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(value).map_err(|e| Format::Json.error(e))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Format::Json.error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_output_is_pretty() {
        let bytes = JsonSerializer
            .serialize(&serde_json::json!({"a": 1, "b": [true]}))
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("\"a\": 1"));
    }

    #[test]
    fn test_wrong_shape() {
        let result: Result<Vec<u32>> = JsonSerializer.deserialize(br#"{"a": 1}"#);
        assert!(matches!(result, Err(Error::Serialization { format: "json", .. })));
    }
}
