//! Execution cache for expensive per-document computations.
//!
//! Modules use the cache to skip recomputing derived values (rendered markup,
//! extracted excerpts, parsed structures) when a document's content has not
//! changed. Entries survive across generations, so a watch-style host that
//! re-runs the engine pays the expensive work only for documents whose
//! content actually moved.
//!
//! # Cache keys
//!
//! The cache is **content-addressed**: lookups are by the combination of the
//! document's content hash and a caller-chosen key string, never by document
//! instance. Re-reading an unchanged file produces a new document instance
//! with the same content hash, so it still hits. Metadata does not
//! participate in the key; a computation whose result depends on metadata
//! should fold the relevant values into its key string.
//!
//! # Exactly-once factories
//!
//! [`get_or_compute`](ExecutionCache::get_or_compute) runs its factory at
//! most once per (content, key) pair, no matter how many callers race on it.
//! Each entry has its own lock, held while the factory runs, so concurrent
//! writers for different keys never contend. A factory that returns an error
//! stores nothing; the next caller for that pair runs it again.
//!
//! A factory must not re-enter the cache under its own key, which would
//! deadlock on the entry lock. Different keys are fine.
//!
//! # Lifetime
//!
//! Entries are never evicted. Sizing and eviction policy belong to the host,
//! which can drop the engine (and with it the cache) whenever it wants a
//! cold start.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::document::{Document, DocumentError};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache entry for key '{0}' holds a value of a different type")]
    TypeMismatch(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

type Stored = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Slot {
    value: Mutex<Option<Stored>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: String,
    key: String,
}

/// Content-addressed memoization shared by all pipelines of an engine.
#[derive(Default)]
pub struct ExecutionCache {
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
    stats: Mutex<CacheStats>,
}

impl ExecutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for (document content, key), or run `factory`
    /// and cache its result.
    ///
    /// The stored type is fixed by the first successful computation for a
    /// pair; asking for a different `T` under the same pair is a
    /// [`CacheError::TypeMismatch`].
    pub fn get_or_compute<T, E, F>(
        &self,
        document: &Document,
        key: &str,
        factory: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce(&Document) -> Result<T, E>,
    {
        let content_hash = document
            .content_hash()
            .map_err(|e| E::from(CacheError::from(e)))?
            .to_string();
        let cache_key = CacheKey {
            content_hash,
            key: key.to_string(),
        };

        // The map lock is held only long enough to find or create the slot.
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(cache_key).or_default())
        };

        let mut value = slot.value.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stored) = value.as_ref() {
            let hit = Arc::clone(stored)
                .downcast::<T>()
                .map_err(|_| E::from(CacheError::TypeMismatch(key.to_string())))?;
            self.record(|s| s.hits += 1);
            return Ok(hit);
        }

        let computed = Arc::new(factory(document)?);
        *value = Some(computed.clone() as Stored);
        self.record(|s| s.misses += 1);
        Ok(computed)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hit/miss counters since the engine was created.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut stats);
    }
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} computed ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} computed", self.misses)
        }
    }
}
