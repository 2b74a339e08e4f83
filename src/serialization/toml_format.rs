//! TOML serializer.

use super::{Format, Serializer};
use crate::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Pretty TOML via the `toml` crate.
///
/// Only values that serialize to a table (structs, maps) are supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TomlSerializer;

impl Serializer for TomlSerializer {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        toml::to_string_pretty(value)
            .map(String::into_bytes)
            .map_err(|e| Format::Toml.error(e))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let text = std::str::from_utf8(bytes).map_err(|e| Format::Toml.error(e))?;
        toml::from_str(text).map_err(|e| Format::Toml.error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_scalar_top_level_is_rejected() {
        let result = TomlSerializer.serialize(&42_u32);
        assert!(matches!(result, Err(Error::Serialization { format: "toml", .. })));
    }

    #[test]
    fn test_invalid_utf8() {
        let result: Result<std::collections::BTreeMap<String, String>> =
            TomlSerializer.deserialize(&[0xff, 0xfe]);
        assert!(matches!(result, Err(Error::Serialization { .. })));
    }
}
