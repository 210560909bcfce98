//! Rewriting document content and metadata.

use std::sync::Arc;

use crate::document::{Content, Document};
use crate::module::{EngineError, ExecutionContext, Module};
use crate::value::Value;

/// Computes a content fragment from the document being transformed.
pub type ContentFn =
    Arc<dyn Fn(&Document, &ExecutionContext<'_>) -> Result<String, EngineError> + Send + Sync>;

/// Computes a metadata value from the document being transformed.
pub type ValueFn =
    Arc<dyn Fn(&Document, &ExecutionContext<'_>) -> Result<Value, EngineError> + Send + Sync>;

/// Where a [`ContentTransform`] gets its text.
pub enum ContentSource {
    /// A fixed string, the same for every document.
    Literal(String),
    /// Computed per document.
    Delegate(ContentFn),
    /// A module chain run once with no inputs; the first document it
    /// produces supplies the text.
    Modules(Vec<Box<dyn Module>>),
}

impl ContentSource {
    pub fn literal(text: impl Into<String>) -> Self {
        ContentSource::Literal(text.into())
    }

    pub fn delegate<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext<'_>) -> Result<String, EngineError>
            + Send
            + Sync
            + 'static,
    {
        ContentSource::Delegate(Arc::new(f))
    }

    pub fn modules(children: Vec<Box<dyn Module>>) -> Self {
        ContentSource::Modules(children)
    }
}

#[derive(Clone, Copy)]
enum MergeMode {
    Replace,
    Append,
    Prepend,
}

/// Replaces, appends to, or prepends to each document's content.
///
/// The three shapes differ only in how the sourced text combines with what
/// is already there, so they share one module. A [`ContentSource::Modules`]
/// chain runs once per execution, not once per document.
pub struct ContentTransform {
    source: ContentSource,
    mode: MergeMode,
}

impl ContentTransform {
    /// Replace the content outright.
    pub fn set(source: ContentSource) -> Self {
        Self {
            source,
            mode: MergeMode::Replace,
        }
    }

    /// Keep the content and add the sourced text after it.
    pub fn append(source: ContentSource) -> Self {
        Self {
            source,
            mode: MergeMode::Append,
        }
    }

    /// Keep the content and add the sourced text before it.
    pub fn prepend(source: ContentSource) -> Self {
        Self {
            source,
            mode: MergeMode::Prepend,
        }
    }
}

enum ResolvedSource<'a> {
    Fixed(String),
    PerDocument(&'a ContentFn),
}

impl Module for ContentTransform {
    fn name(&self) -> &str {
        match self.mode {
            MergeMode::Replace => "set-content",
            MergeMode::Append => "append-content",
            MergeMode::Prepend => "prepend-content",
        }
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let resolved = match &self.source {
            ContentSource::Literal(text) => ResolvedSource::Fixed(text.clone()),
            ContentSource::Delegate(f) => ResolvedSource::PerDocument(f),
            ContentSource::Modules(children) => {
                let produced = ctx.execute_nested(children, &[])?;
                let first = produced
                    .first()
                    .ok_or_else(|| EngineError::module("content chain produced no documents"))?;
                ResolvedSource::Fixed(first.content()?.to_string())
            }
        };

        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let fragment = match &resolved {
                ResolvedSource::Fixed(text) => text.clone(),
                ResolvedSource::PerDocument(f) => {
                    f(doc, ctx).map_err(|e| EngineError::for_document(doc, e))?
                }
            };
            let text = match self.mode {
                MergeMode::Replace => fragment,
                MergeMode::Append => format!("{}{}", doc.content()?, fragment),
                MergeMode::Prepend => format!("{}{}", fragment, doc.content()?),
            };
            outputs.push(doc.clone_with(Some(Content::from(text)), None::<(&str, Value)>));
        }
        Ok(outputs)
    }
}

/// Where a [`SetMetadata`] gets its value.
pub enum ValueSource {
    Literal(Value),
    Delegate(ValueFn),
}

/// Sets one metadata key on every document.
pub struct SetMetadata {
    key: String,
    value: ValueSource,
}

impl SetMetadata {
    /// Set the key to a fixed value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: ValueSource::Literal(value.into()),
        }
    }

    /// Set the key to a value computed per document.
    pub fn computed<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext<'_>) -> Result<Value, EngineError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            key: key.into(),
            value: ValueSource::Delegate(Arc::new(f)),
        }
    }
}

impl Module for SetMetadata {
    fn name(&self) -> &str {
        "set-metadata"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let value = match &self.value {
                ValueSource::Literal(value) => value.clone(),
                ValueSource::Delegate(f) => {
                    f(doc, ctx).map_err(|e| EngineError::for_document(doc, e))?
                }
            };
            outputs.push(doc.clone_with(None, vec![(self.key.as_str(), value)]));
        }
        Ok(outputs)
    }
}
