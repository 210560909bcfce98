//! The module contract and the execution context handed to every module.
//!
//! A [`Module`] is the single plugin seam of the engine: anything that
//! transforms documents (readers, renderers, writers, filters, the control
//! flow combinators in [`modules`](crate::modules)) implements
//! `execute(inputs, ctx) -> outputs`. Modules never mutate their inputs, and
//! a stage's output is fully realized before the next stage starts.
//!
//! # The context
//!
//! [`ExecutionContext`] is a module's window into the engine for the duration
//! of one call. It creates and clones documents (the only construction path
//! for modules), runs nested module lists, reaches the execution cache and
//! the outputs of already-finished pipelines, and carries the global
//! settings, the diagnostic event sink, and the host's application input.
//!
//! # Nested execution
//!
//! [`execute_nested`](ExecutionContext::execute_nested) runs an independent
//! module list synchronously to completion and hands back its output without
//! touching the caller's inputs. Every control flow construct (branching,
//! per-document iteration, conditionals, grouping, pagination) is built on
//! this one mechanism. Nesting depth is tracked on the context and reported
//! in progress events, which keeps deeply nested runs observable.
//!
//! # Errors
//!
//! A module failure aborts the generation. On the way out the error is
//! wrapped with the pipeline and module it escaped from, and a failure event
//! naming the document being processed (when known) is emitted exactly once,
//! at the level closest to the failure. Modules with a sensible degraded
//! result for a single bad document may recover locally instead of failing;
//! that choice belongs to the module, never to the engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

use crate::cache::{CacheError, ExecutionCache};
use crate::config::{LINK_ROOT, Settings};
use crate::document::{Content, Document, DocumentError};
use crate::engine::{DocumentRegistry, ExecutionEvent};
use crate::value::{MetadataError, Value};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("while processing {document}: {source}")]
    PerDocument {
        document: String,
        source: Box<EngineError>,
    },
    #[error("module '{module}' in pipeline '{pipeline}' failed: {source}")]
    Stage {
        pipeline: String,
        module: String,
        source: Box<EngineError>,
    },
    #[error("{0}")]
    Module(String),
}

impl EngineError {
    pub fn config(message: impl Into<String>) -> EngineError {
        EngineError::Config(message.into())
    }

    pub fn module(message: impl Into<String>) -> EngineError {
        EngineError::Module(message.into())
    }

    /// Wrap an error with the document that was being processed when it
    /// surfaced, so the trace names the offending source.
    pub fn for_document(document: &Document, source: EngineError) -> EngineError {
        EngineError::PerDocument {
            document: document.to_string(),
            source: Box::new(source),
        }
    }

    /// The document named closest to the top of the trace, if any.
    fn document_context(&self) -> Option<&str> {
        match self {
            EngineError::PerDocument { document, .. } => Some(document),
            EngineError::Stage { source, .. } => source.document_context(),
            _ => None,
        }
    }
}

/// A pipeline stage: transforms an ordered batch of documents into another.
///
/// Implementations must not mutate inputs (the document type enforces this)
/// and must preserve the relative order of documents they pass through,
/// unless reordering is the module's stated purpose.
pub trait Module: Send + Sync {
    /// Short name used in progress output and error traces.
    fn name(&self) -> &str;

    /// Transform a batch. Returning an empty vector is valid and simply
    /// hands the next stage nothing.
    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError>;
}

/// A reusable document predicate, shared by the filtering and branching
/// modules.
pub type Predicate =
    Arc<dyn Fn(&Document, &ExecutionContext<'_>) -> Result<bool, EngineError> + Send + Sync>;

/// A module's window into the engine during one `execute` call.
pub struct ExecutionContext<'a> {
    pipeline: &'a str,
    depth: usize,
    settings: &'a Arc<Settings>,
    cache: &'a ExecutionCache,
    registry: &'a DocumentRegistry,
    events: Option<&'a Sender<ExecutionEvent>>,
    app_input: Option<&'a str>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        pipeline: &'a str,
        settings: &'a Arc<Settings>,
        cache: &'a ExecutionCache,
        registry: &'a DocumentRegistry,
        events: Option<&'a Sender<ExecutionEvent>>,
        app_input: Option<&'a str>,
    ) -> Self {
        Self {
            pipeline,
            depth: 0,
            settings,
            cache,
            registry,
            events,
            app_input,
        }
    }

    fn child(&self) -> ExecutionContext<'a> {
        ExecutionContext {
            depth: self.depth + 1,
            ..*self
        }
    }

    /// Name of the pipeline this call runs under.
    pub fn pipeline(&self) -> &str {
        self.pipeline
    }

    /// Nesting depth: 0 for a pipeline's own stages, +1 per nested run.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn cache(&self) -> &ExecutionCache {
        self.cache
    }

    /// Opaque input handed to the engine by the host, if any.
    pub fn application_input(&self) -> Option<&str> {
        self.app_input
    }

    /// Create a fresh document.
    pub fn new_document<K, V>(
        &self,
        source: Option<PathBuf>,
        content: Content,
        items: impl IntoIterator<Item = (K, V)>,
    ) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Document::new(Arc::clone(self.settings), source, content, items)
    }

    /// Derive a document from `parent`, or create a fresh one when there is
    /// no parent to derive from.
    ///
    /// With a parent this is the overlay operation of
    /// [`Document::clone_with`]; without one, the result is a brand-new
    /// synthetic document carrying only `content` and `items`.
    pub fn clone_document<K, V>(
        &self,
        parent: Option<&Document>,
        content: Option<Content>,
        items: impl IntoIterator<Item = (K, V)>,
    ) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        match parent {
            Some(parent) => parent.clone_with(content, items),
            None => Document::new(
                Arc::clone(self.settings),
                None,
                content.unwrap_or_default(),
                items,
            ),
        }
    }

    /// Run an independent module list to completion and return its output.
    ///
    /// The caller's inputs are not affected; what the caller does with the
    /// returned documents defines the control flow construct. Errors from
    /// nested modules propagate to the caller.
    pub fn execute_nested(
        &self,
        modules: &[Box<dyn Module>],
        inputs: &[Document],
    ) -> Result<Vec<Document>, EngineError> {
        run_modules(modules, inputs, &self.child())
    }

    /// Outputs of a pipeline that already completed in this generation, or
    /// retained from an earlier one. `None` until that pipeline publishes.
    pub fn pipeline_outputs(&self, name: &str) -> Option<&[Document]> {
        self.registry.get(name)
    }

    /// Outputs of every published pipeline except the one this call runs
    /// under, in pipeline declaration order.
    pub fn all_outputs(&self) -> Vec<Document> {
        self.registry.all_except(self.pipeline)
    }

    /// Report that a module degraded for one document instead of failing
    /// the run. Goes to the host's event channel.
    pub fn warn(&self, module: &str, document: &Document, message: impl Into<String>) {
        self.emit(ExecutionEvent::DocumentWarning {
            pipeline: self.pipeline.to_string(),
            module: module.to_string(),
            document: document.to_string(),
            message: message.into(),
        });
    }

    /// Join a relative path onto the configured link root.
    pub fn link(&self, relative: &str) -> String {
        let root = self
            .settings
            .get_as::<String>(LINK_ROOT)
            .unwrap_or_else(|_| "/".to_string());
        format!(
            "{}/{}",
            root.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    pub(crate) fn emit(&self, event: ExecutionEvent) {
        if let Some(sender) = self.events {
            // A host that dropped its receiver loses progress output, not
            // the build.
            let _ = sender.send(event);
        }
    }
}

/// Run `modules` in order, threading the document batch through each.
///
/// Shared by the engine's pipeline loop and by nested execution. Emits
/// started/finished events per module; on failure wraps the error with the
/// pipeline and module it escaped from and emits a failure event, unless an
/// inner run already reported it.
pub(crate) fn run_modules(
    modules: &[Box<dyn Module>],
    inputs: &[Document],
    ctx: &ExecutionContext<'_>,
) -> Result<Vec<Document>, EngineError> {
    let mut documents = inputs.to_vec();
    for module in modules {
        let input_count = documents.len();
        ctx.emit(ExecutionEvent::ModuleStarted {
            pipeline: ctx.pipeline.to_string(),
            module: module.name().to_string(),
            depth: ctx.depth,
            inputs: input_count,
        });
        documents = match module.execute(&documents, ctx) {
            Ok(outputs) => outputs,
            Err(source) => {
                let already_reported = matches!(source, EngineError::Stage { .. });
                let err = EngineError::Stage {
                    pipeline: ctx.pipeline.to_string(),
                    module: module.name().to_string(),
                    source: Box::new(source),
                };
                if !already_reported {
                    let message = err.to_string();
                    match err.document_context() {
                        Some(document) => ctx.emit(ExecutionEvent::DocumentFailed {
                            pipeline: ctx.pipeline.to_string(),
                            module: module.name().to_string(),
                            document: document.to_string(),
                            message,
                        }),
                        None => ctx.emit(ExecutionEvent::ModuleFailed {
                            pipeline: ctx.pipeline.to_string(),
                            module: module.name().to_string(),
                            message,
                        }),
                    }
                }
                return Err(err);
            }
        };
        ctx.emit(ExecutionEvent::ModuleFinished {
            pipeline: ctx.pipeline.to_string(),
            module: module.name().to_string(),
            depth: ctx.depth,
            inputs: input_count,
            outputs: documents.len(),
        });
    }
    Ok(documents)
}
