//! YAML serializer.

use super::{Format, Serializer};
use crate::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// YAML via `serde_yaml_ng`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_yaml_ng::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| Format::Yaml.error(e))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_yaml_ng::from_slice(bytes).map_err(|e| Format::Yaml.error(e))
    }
}
