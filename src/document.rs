//! The immutable document and its layered metadata store.
//!
//! A [`Document`] is the unit of work flowing through pipelines: content plus
//! metadata, with an optional stable `source` identity for documents that came
//! from somewhere (typically a file path). Documents are never mutated.
//! Every transformation produces new instances, so a module can hand the same
//! input to several nested executions without copying, and parallel stages
//! can read inputs without locks.
//!
//! # Identity
//!
//! Each instance carries a process-unique id. Equality compares ids: two
//! documents are equal only when they are the same instance. Content-based
//! equivalence (used by the execution cache and incremental reuse) goes
//! through [`Document::content_hash`] instead, so a re-read of an unchanged
//! file hashes the same even though it is a brand-new instance.
//!
//! # Cloning
//!
//! [`Document::clone_with`] is the overlay operation: the new document keeps
//! the parent's source, content, and metadata, with the given items written
//! over it (new keys win on collision). Lazy metadata entries are copied with
//! fresh memo cells, so each instance resolves them independently.
//!
//! # Content
//!
//! Content is either inline text or an owned byte stream. A stream is
//! realized into text at most once, on first access, and the underlying
//! reader is dropped the moment it has been fully read. A document discarded
//! without ever touching its stream drops the reader with it. Either way the
//! stream's release point is deterministic.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

use crate::config::Settings;
use crate::value::{FromValue, MetadataError, Value};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read content stream: {0}")]
    Stream(#[from] std::io::Error),
    #[error("content stream unavailable after a failed read")]
    StreamPoisoned,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Document content: inline text or an owned stream realized on demand.
///
/// Cloning is cheap and shares the underlying data, so a document clone that
/// keeps its parent's content does not copy it.
#[derive(Clone)]
pub enum Content {
    Inline(Arc<str>),
    Stream(Arc<StreamContent>),
}

impl Content {
    pub fn empty() -> Self {
        Content::Inline(Arc::from(""))
    }

    /// Take ownership of a reader. The reader is consumed on first access to
    /// the text and dropped immediately afterwards.
    pub fn stream<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Content::Stream(Arc::new(StreamContent {
            reader: Mutex::new(Some(Box::new(reader))),
            realized: OnceLock::new(),
        }))
    }

    /// The text form, realizing a stream on first call.
    pub fn text(&self) -> Result<&str, DocumentError> {
        match self {
            Content::Inline(s) => Ok(s),
            Content::Stream(stream) => stream.realize(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::empty()
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Inline(Arc::from(s))
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Inline(Arc::from(s))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Inline(s) => write!(f, "Inline({} bytes)", s.len()),
            Content::Stream(stream) => match stream.realized.get() {
                Some(s) => write!(f, "Stream(realized, {} bytes)", s.len()),
                None => write!(f, "Stream(pending)"),
            },
        }
    }
}

/// An owned reader realized into text at most once.
pub struct StreamContent {
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    realized: OnceLock<String>,
}

impl StreamContent {
    fn realize(&self) -> Result<&str, DocumentError> {
        if let Some(text) = self.realized.get() {
            return Ok(text);
        }
        let mut slot = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        // A racing caller may have realized while we waited for the lock.
        if let Some(text) = self.realized.get() {
            return Ok(text);
        }
        let mut reader = slot.take().ok_or(DocumentError::StreamPoisoned)?;
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        // Reader released here, while the document may live on.
        drop(reader);
        Ok(self.realized.get_or_init(|| text))
    }
}

struct DocInner {
    id: u64,
    source: Option<PathBuf>,
    content: Content,
    metadata: BTreeMap<String, Value>,
    settings: Arc<Settings>,
    content_hash: OnceLock<String>,
}

/// An immutable content+metadata value with optional source identity.
///
/// Construction goes through the execution context (or the engine, for seed
/// documents); modules receive instances and derive new ones with
/// [`clone_with`](Document::clone_with).
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocInner>,
}

impl Document {
    pub(crate) fn new<K, V>(
        settings: Arc<Settings>,
        source: Option<PathBuf>,
        content: Content,
        items: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut metadata = BTreeMap::new();
        for (key, value) in items {
            metadata.insert(key.into(), value.into().detached());
        }
        Document {
            inner: Arc::new(DocInner {
                id: next_id(),
                source,
                content,
                metadata,
                settings,
                content_hash: OnceLock::new(),
            }),
        }
    }

    /// Derive a new document from this one.
    ///
    /// The result keeps this document's source and settings. Content is
    /// inherited (shared, not copied) unless `new_content` replaces it; when
    /// it does, an unrealized stream on the parent stays owned solely by the
    /// parent and is released when the parent is discarded. Metadata is this
    /// document's map overlaid with `items`, items winning on collision.
    /// Lazy entries are copied with fresh memo cells on both sides of the
    /// overlay.
    pub fn clone_with<K, V>(
        &self,
        new_content: Option<Content>,
        items: impl IntoIterator<Item = (K, V)>,
    ) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut metadata: BTreeMap<String, Value> = self
            .inner
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.detached()))
            .collect();
        for (key, value) in items {
            metadata.insert(key.into(), value.into().detached());
        }
        Document {
            inner: Arc::new(DocInner {
                id: next_id(),
                source: self.inner.source.clone(),
                content: new_content.unwrap_or_else(|| self.inner.content.clone()),
                metadata,
                settings: Arc::clone(&self.inner.settings),
                content_hash: OnceLock::new(),
            }),
        }
    }

    /// Process-unique instance id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The stable source identity, if this document has one.
    pub fn source(&self) -> Option<&Path> {
        self.inner.source.as_deref()
    }

    /// The content text, realizing a stream on first access.
    pub fn content(&self) -> Result<&str, DocumentError> {
        self.inner.content.text()
    }

    /// The content, for inheriting into sibling documents.
    pub fn raw_content(&self) -> &Content {
        &self.inner.content
    }

    /// SHA-256 of the content, as a hex string. Computed once per instance;
    /// realizes a stream if necessary.
    pub fn content_hash(&self) -> Result<&str, DocumentError> {
        if let Some(hash) = self.inner.content_hash.get() {
            return Ok(hash);
        }
        let text = self.content()?;
        let hex = format!("{:x}", Sha256::digest(text.as_bytes()));
        Ok(self.inner.content_hash.get_or_init(|| hex))
    }

    /// Look up a key: document metadata first, then the global settings.
    ///
    /// Returns `None` only when the key is absent from both layers. A stored
    /// null comes back as `Some(Value::Null)`. Lazy entries resolve here and
    /// stay memoized for this instance.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_local(key)
            .or_else(|| self.inner.settings.get(key).map(Value::resolve))
    }

    /// Look up a key in this document's own metadata only, without the
    /// settings fallback.
    pub fn get_local(&self, key: &str) -> Option<Value> {
        self.inner.metadata.get(key).map(Value::resolve)
    }

    /// Whether `get` would find the key in either layer.
    pub fn has(&self, key: &str) -> bool {
        self.inner.metadata.contains_key(key) || self.inner.settings.get(key).is_some()
    }

    /// Typed lookup with best-effort coercion.
    ///
    /// An absent key is [`MetadataError::NotFound`]; a present value that
    /// cannot coerce to `T` is [`MetadataError::Conversion`].
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<T, MetadataError> {
        let value = self
            .get(key)
            .ok_or_else(|| MetadataError::NotFound(key.to_string()))?;
        T::from_value(&value).map_err(|source| MetadataError::Conversion {
            key: key.to_string(),
            source,
        })
    }

    /// This document's own metadata map. Lazy entries are unresolved in this
    /// view; use [`get`](Document::get) for resolved access.
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.inner.metadata
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Document {}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.source {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "synthetic document #{}", self.inner.id),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("content", &self.inner.content)
            .field("keys", &self.inner.metadata.keys().collect::<Vec<_>>())
            .finish()
    }
}
