//! Tagged metadata values and their conversion rules.
//!
//! Every metadata entry in a [`Document`](crate::document::Document) and every
//! key in the global [`Settings`](crate::config::Settings) holds a [`Value`].
//! Using a closed enum rather than an open-ended dynamic bag keeps typed
//! lookups explicit: a failed coercion is a [`ConversionError`] naming both
//! sides, and "the key is absent" is a different condition from "the key holds
//! something I can't use".
//!
//! # Conversions
//!
//! [`FromValue`] implements best-effort coercion in one direction only, value
//! to Rust type. The rules are deliberately small:
//!
//! - numbers parse from strings (`"42"` → `42`), integers widen to floats
//! - booleans parse from `"true"` / `"false"` (case-insensitive)
//! - scalars render to strings with their `Display` form
//! - any scalar converts to a one-element sequence
//!
//! Anything outside these rules fails with a [`ConversionError`]. There is no
//! implicit null coalescing: converting [`Value::Null`] always fails.
//!
//! # Lazy entries
//!
//! [`Value::Lazy`] wraps a factory that runs on first access and memoizes its
//! result for the lifetime of the holding document instance. Cloning a
//! document copies its metadata map with fresh memo cells (see
//! [`Value::detached`]), so each instance resolves its lazy entries
//! independently. Cloning a bare `Value` shares the cell: a plain value clone
//! is the same logical entry, not a new document instance.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::document::Document;

/// Factory behind a [`Value::Lazy`] entry. Runs at most once per holding
/// document instance.
pub type LazyFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A typed metadata value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// An explicitly stored null. Distinct from an absent key.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An ordered sequence of values.
    Seq(Vec<Value>),
    /// A nested document. The document keeps its own instance identity.
    Doc(Document),
    /// A value computed on first access and memoized per document instance.
    Lazy(LazyValue),
}

/// A lazily computed value: a shared factory plus a memo cell.
#[derive(Clone)]
pub struct LazyValue {
    factory: LazyFactory,
    cell: Arc<OnceLock<Value>>,
}

impl LazyValue {
    pub fn new(factory: LazyFactory) -> Self {
        Self {
            factory,
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Resolve the value, running the factory on first call.
    pub fn resolve(&self) -> &Value {
        self.cell.get_or_init(|| (self.factory)())
    }

    /// Whether the factory has already run for this cell.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Same factory, fresh memo cell. Used when metadata is copied into a
    /// new document instance.
    fn detached(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            cell: Arc::new(OnceLock::new()),
        }
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(v) => write!(f, "Lazy(resolved: {:?})", v),
            None => write!(f, "Lazy(unresolved)"),
        }
    }
}

impl Value {
    /// Build a lazy value from a factory closure.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Value::Lazy(LazyValue::new(Arc::new(factory)))
    }

    /// The kind of this value, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Doc(_) => "document",
            Value::Lazy(_) => "lazy",
        }
    }

    /// Resolve a lazy value into its computed form; other variants clone.
    ///
    /// Resolution is shallow: a sequence containing lazy elements keeps them
    /// lazy until each element is accessed through a document lookup.
    pub fn resolve(&self) -> Value {
        match self {
            Value::Lazy(lazy) => lazy.resolve().clone(),
            other => other.clone(),
        }
    }

    /// Clone for a new document instance: lazy entries get fresh memo cells
    /// so the new instance resolves them independently. Recurses into
    /// sequences; nested documents keep their own identity and state.
    pub(crate) fn detached(&self) -> Value {
        match self {
            Value::Lazy(lazy) => Value::Lazy(lazy.detached()),
            Value::Seq(items) => Value::Seq(items.iter().map(Value::detached).collect()),
            other => other.clone(),
        }
    }

    /// Total order over values, used by sorting modules.
    ///
    /// Values of the same kind compare naturally (integers and floats compare
    /// as numbers). Values of different kinds order by kind: null, bool,
    /// number, string, sequence, document. Lazy values resolve first.
    pub fn compare(&self, other: &Value) -> Ordering {
        let a = deref_lazy(self);
        let b = deref_lazy(other);
        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Int(x), Value::Int(y)) => x.cmp(y),
            (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
            (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
            (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            (Value::Seq(x), Value::Seq(y)) => {
                for (xv, yv) in x.iter().zip(y.iter()) {
                    let ord = xv.compare(yv);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            (Value::Doc(x), Value::Doc(y)) => x.id().cmp(&y.id()),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        }
    }
}

/// Follow a lazy value to its resolved form without cloning.
fn deref_lazy(value: &Value) -> &Value {
    match value {
        Value::Lazy(lazy) => lazy.resolve(),
        other => other,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Str(_) => 3,
        Value::Seq(_) => 4,
        Value::Doc(_) => 5,
        // deref_lazy resolves before ranking; a lazy here means the factory
        // itself returned a lazy value, which ranks last.
        Value::Lazy(_) => 6,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Doc(a), Value::Doc(b)) => a == b,
            (Value::Lazy(a), Value::Lazy(b)) => Arc::ptr_eq(&a.cell, &b.cell),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Doc(doc) => write!(f, "{}", doc),
            Value::Lazy(lazy) => match lazy.cell.get() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "<lazy>"),
            },
        }
    }
}

// ============================================================================
// Construction conveniences
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Doc(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Typed extraction
// ============================================================================

/// A value could not be coerced to the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {found} to {wanted}")]
pub struct ConversionError {
    pub found: &'static str,
    pub wanted: &'static str,
}

impl ConversionError {
    fn new(found: &Value, wanted: &'static str) -> Self {
        Self {
            found: found.type_name(),
            wanted,
        }
    }
}

/// A typed metadata lookup failed.
///
/// `NotFound` and `Conversion` are deliberately separate: an absent key and a
/// key holding an incompatible value call for different fixes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("metadata key '{0}' not found")]
    NotFound(String),
    #[error("metadata key '{key}': {source}")]
    Conversion {
        key: String,
        #[source]
        source: ConversionError,
    },
}

/// Best-effort extraction of a Rust type from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match deref_lazy(value) {
            Value::Bool(b) => Ok(*b),
            Value::Str(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Value::Str(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            other => Err(ConversionError::new(other, "bool")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let value = deref_lazy(value);
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(x) if x.fract() == 0.0 => Ok(*x as i64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new(value, "integer")),
            other => Err(ConversionError::new(other, "integer")),
        }
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let i = i64::from_value(value)?;
        usize::try_from(i).map_err(|_| ConversionError {
            found: "negative integer",
            wanted: "usize",
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let value = deref_lazy(value);
        match value {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(x) => Ok(*x),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new(value, "float")),
            other => Err(ConversionError::new(other, "float")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match deref_lazy(value) {
            Value::Str(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            other => Err(ConversionError::new(other, "string")),
        }
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match deref_lazy(value) {
            Value::Str(s) => Ok(PathBuf::from(s)),
            other => Err(ConversionError::new(other, "path")),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let value = deref_lazy(value);
        match value {
            Value::Seq(items) => Ok(items.clone()),
            Value::Null => Err(ConversionError::new(value, "sequence")),
            other => Ok(vec![other.clone()]),
        }
    }
}

impl FromValue for Document {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match deref_lazy(value) {
            Value::Doc(doc) => Ok(doc.clone()),
            other => Err(ConversionError::new(other, "document")),
        }
    }
}

impl FromValue for Vec<Document> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match deref_lazy(value) {
            Value::Seq(items) => items.iter().map(Document::from_value).collect(),
            Value::Doc(doc) => Ok(vec![doc.clone()]),
            other => Err(ConversionError::new(other, "document sequence")),
        }
    }
}
