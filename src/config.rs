//! Global settings: the read-only fallback layer behind document metadata.
//!
//! [`Settings`] is a flat bag of [`Value`]s consulted whenever a key is
//! absent from a document's own metadata. It is read-only for the life of an
//! engine; per-document state belongs in document metadata, not here.
//!
//! ## Loading
//!
//! Settings load from a TOML file (`galley.toml` by convention). Nested
//! tables flatten into dotted keys, so
//!
//! ```toml
//! site_title = "My Site"
//!
//! [author]
//! name = "A. Writer"
//! ```
//!
//! yields the keys `site_title` and `author.name`. Arrays of scalars become
//! sequence values; arrays containing tables flatten with numeric segments
//! (`authors.0.name`). Because keys are pre-flattened, merging two settings
//! layers is a plain key-by-key overlay and still behaves like a deep merge.
//!
//! ## Typed access
//!
//! `get_as` shares the coercion rules of document metadata (see
//! [`FromValue`](crate::value::FromValue)), so a module reading
//! `settings first, document second` sees one consistent conversion behavior.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::value::{FromValue, MetadataError, Value};

/// Settings key for the site link root used by
/// [`ExecutionContext::link`](crate::module::ExecutionContext::link).
pub const LINK_ROOT: &str = "link_root";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The global key/value fallback consulted after document metadata.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut settings = Self::new();
        for (key, value) in items {
            settings.set(key, value);
        }
        settings
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let parsed: toml::Value = toml::from_str(text)?;
        let mut values = BTreeMap::new();
        flatten_toml("", parsed, &mut values);
        Ok(Self { values })
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load settings from a TOML file, or return empty settings if the file
    /// does not exist. Parse errors still fail.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load(path)
    }

    /// Overlay another settings layer on top of this one. Overlay keys win;
    /// keys only in `self` are preserved. With flattened keys this is a deep
    /// merge.
    pub fn merge(mut self, overlay: Settings) -> Settings {
        self.values.extend(overlay.values);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed lookup with the same coercion rules as document metadata.
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<T, MetadataError> {
        let value = self
            .get(key)
            .ok_or_else(|| MetadataError::NotFound(key.to_string()))?;
        T::from_value(value).map_err(|source| MetadataError::Conversion {
            key: key.to_string(),
            source,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Flatten a TOML value tree into dotted keys.
///
/// Tables recurse per key. Arrays of scalars map to sequence values; arrays
/// containing a table recurse with numeric segments so no data is dropped.
fn flatten_toml(prefix: &str, value: toml::Value, out: &mut BTreeMap<String, Value>) {
    match value {
        toml::Value::Table(table) => {
            for (key, inner) in table {
                let joined = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml(&joined, inner, out);
            }
        }
        toml::Value::Array(items) if items.iter().any(toml::Value::is_table) => {
            for (index, inner) in items.into_iter().enumerate() {
                flatten_toml(&format!("{}.{}", prefix, index), inner, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), value_from_toml(other));
        }
    }
}

/// Convert a non-table TOML value into a metadata value.
fn value_from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::Seq(items.into_iter().map(value_from_toml).collect()),
        // Tables are flattened before this point; one reaching here (inside a
        // scalar array) maps to its key list to stay total.
        toml::Value::Table(table) => {
            Value::Seq(table.into_iter().map(|(key, _)| Value::Str(key)).collect())
        }
    }
}
