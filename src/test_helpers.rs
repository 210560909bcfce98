//! Shared test utilities for the galley test suite.
//!
//! Provides document constructors, a context harness that owns the pieces an
//! [`ExecutionContext`] borrows, and small stub modules for observing how
//! combinators drive their children.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let harness = CtxHarness::new();
//! let ctx = harness.ctx();
//!
//! let (recorder, log) = Recorder::new("rec");
//! let children: Vec<Box<dyn Module>> = vec![Box::new(recorder)];
//! ctx.execute_nested(&children, &[doc("alpha")]).unwrap();
//! assert_eq!(*log.lock().unwrap(), vec![vec!["alpha".to_string()]]);
//! ```

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::cache::ExecutionCache;
use crate::config::Settings;
use crate::document::{Content, Document};
use crate::engine::{DocumentRegistry, ExecutionEvent};
use crate::module::{EngineError, ExecutionContext, Module};
use crate::value::Value;

// =========================================================================
// Document constructors
// =========================================================================

pub fn settings() -> Arc<Settings> {
    Arc::new(Settings::default())
}

/// A synthetic document with inline content and no metadata.
pub fn doc(content: &str) -> Document {
    Document::new(settings(), None, Content::from(content), None::<(&str, Value)>)
}

/// A synthetic document with inline content and the given metadata.
pub fn doc_with(content: &str, items: Vec<(&str, Value)>) -> Document {
    Document::new(settings(), None, Content::from(content), items)
}

/// A sourced document, as if read from `source`.
pub fn doc_from(source: &str, content: &str) -> Document {
    Document::new(
        settings(),
        Some(PathBuf::from(source)),
        Content::from(content),
        None::<(&str, Value)>,
    )
}

// =========================================================================
// Context harness
// =========================================================================

/// Owns everything an [`ExecutionContext`] borrows, so module tests can run
/// without building an engine.
pub struct CtxHarness {
    pub settings: Arc<Settings>,
    pub cache: ExecutionCache,
    pub registry: DocumentRegistry,
}

impl CtxHarness {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            cache: ExecutionCache::new(),
            registry: DocumentRegistry::default(),
        }
    }

    /// A context for the pipeline name "test".
    pub fn ctx(&self) -> ExecutionContext<'_> {
        self.ctx_named("test")
    }

    pub fn ctx_named<'a>(&'a self, pipeline: &'a str) -> ExecutionContext<'a> {
        ExecutionContext::new(pipeline, &self.settings, &self.cache, &self.registry, None, None)
    }

    pub fn ctx_with_events<'a>(&'a self, events: &'a Sender<ExecutionEvent>) -> ExecutionContext<'a> {
        ExecutionContext::new(
            "test",
            &self.settings,
            &self.cache,
            &self.registry,
            Some(events),
            None,
        )
    }
}

// =========================================================================
// Stub modules
// =========================================================================

/// One entry per `execute` call: the content of each input, in order.
pub type CallLog = Arc<Mutex<Vec<Vec<String>>>>;

/// Passes inputs through unchanged, logging what it saw.
pub struct Recorder {
    name: String,
    log: CallLog,
}

impl Recorder {
    pub fn new(name: &str) -> (Self, CallLog) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.to_string(),
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Module for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let seen = inputs
            .iter()
            .map(|d| d.content().unwrap().to_string())
            .collect();
        self.log.lock().unwrap().push(seen);
        Ok(inputs.to_vec())
    }
}

/// Clones every input with one extra metadata entry.
pub struct AddMeta {
    pub key: &'static str,
    pub value: Value,
}

impl Module for AddMeta {
    fn name(&self) -> &str {
        "add-meta"
    }

    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        Ok(inputs
            .iter()
            .map(|d| d.clone_with(None, [(self.key, self.value.clone())]))
            .collect())
    }
}

/// Swallows every input.
pub struct DropAll;

impl Module for DropAll {
    fn name(&self) -> &str {
        "drop-all"
    }

    fn execute(
        &self,
        _inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        Ok(Vec::new())
    }
}

/// Fails with the given message on any call.
pub struct FailWith(pub &'static str);

impl Module for FailWith {
    fn name(&self) -> &str {
        "fail"
    }

    fn execute(
        &self,
        _inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        Err(EngineError::module(self.0))
    }
}
