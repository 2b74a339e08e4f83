//! Object serialization.
//!
//! A repository is generic over a [`Serializer`] that turns objects into
//! bytes and back. The bytes double as the object's fingerprint for dirty
//! checks, so a serializer must be deterministic: serializing equal objects
//! twice yields identical bytes. Types whose serialization iterates a
//! `HashMap` are not deterministic; prefer `BTreeMap` for persisted maps.

mod json;
mod toml_format;
mod yaml;

pub use json::JsonSerializer;
pub use toml_format::TomlSerializer;
pub use yaml::YamlSerializer;

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

/// Converts objects to bytes and back.
pub trait Serializer: Send + Sync + 'static {
    /// Returns the wire format.
    fn format(&self) -> Format;

    /// Serializes `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the value cannot be represented.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserializes a value from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the bytes are not a valid `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Produces an independent copy of `value` by a serialize/deserialize
    /// round trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if either direction fails.
    fn deep_clone<T: Serialize + DeserializeOwned>(&self, value: &T) -> Result<T> {
        let bytes = self.serialize(value)?;
        self.deserialize(&bytes)
    }
}

/// Supported wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
    /// TOML; the top-level value must be a table.
    Toml,
}

impl Format {
    /// Returns all formats.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Json, Self::Yaml, Self::Toml]
    }

    /// Returns the conventional file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    /// Returns the format name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    pub(crate) fn error(self, cause: impl fmt::Display) -> Error {
        Error::Serialization {
            format: self.as_str(),
            cause: cause.to_string(),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(Error::InvalidInput(format!("Unknown format: {s}"))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serializer chosen at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSerializer(pub Format);

impl Serializer for FormatSerializer {
    fn format(&self) -> Format {
        self.0
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self.0 {
            Format::Json => JsonSerializer.serialize(value),
            Format::Yaml => YamlSerializer.serialize(value),
            Format::Toml => TomlSerializer.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self.0 {
            Format::Json => JsonSerializer.deserialize(bytes),
            Format::Yaml => YamlSerializer.deserialize(bytes),
            Format::Toml => TomlSerializer.deserialize(bytes),
        }
    }
}
