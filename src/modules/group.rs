//! Fan-out of inputs over groups of generated documents.

use std::sync::Arc;

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module};
use crate::value::Value;

/// Metadata key holding the group's key value on each fan-out clone.
pub const GROUP_KEY: &str = "group_key";

/// Metadata key holding the group's member documents as a sequence.
pub const GROUP_DOCUMENTS: &str = "group_documents";

/// Extracts the grouping key from a candidate document.
pub type KeyFn = Arc<dyn Fn(&Document) -> Result<Value, EngineError> + Send + Sync>;

/// Clones each input once per group of generated candidate documents.
///
/// The child chain runs once with no inputs and its outputs are the
/// candidates. Candidates are grouped by the key function, groups keeping
/// the order their keys were first seen. Every input is then cloned once
/// per group, input-major, with [`GROUP_KEY`] and [`GROUP_DOCUMENTS`] set
/// on the clone. With no candidates there are no groups and the inputs
/// pass through unchanged.
///
/// The typical shape: the input is a listing template and the candidates
/// are posts grouped by tag, yielding one listing per tag.
pub struct GroupBy {
    children: Vec<Box<dyn Module>>,
    key: KeyFn,
}

impl GroupBy {
    pub fn new<F>(key: F, children: Vec<Box<dyn Module>>) -> Self
    where
        F: Fn(&Document) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        Self {
            children,
            key: Arc::new(key),
        }
    }

    /// Group candidates by a metadata key. Candidates missing the key all
    /// land in one null-keyed group.
    pub fn by_metadata(key: &str, children: Vec<Box<dyn Module>>) -> Self {
        let key = key.to_string();
        Self::new(
            move |d| Ok(d.get(&key).unwrap_or(Value::Null)),
            children,
        )
    }
}

impl Module for GroupBy {
    fn name(&self) -> &str {
        "group-by"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let candidates = ctx.execute_nested(&self.children, &[])?;

        let mut groups: Vec<(Value, Vec<Document>)> = Vec::new();
        for doc in candidates {
            let key = (self.key)(&doc)?;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(doc),
                None => groups.push((key, vec![doc])),
            }
        }

        if groups.is_empty() {
            return Ok(inputs.to_vec());
        }

        let mut outputs = Vec::with_capacity(inputs.len() * groups.len());
        for input in inputs {
            for (key, members) in &groups {
                let docs = Value::Seq(members.iter().cloned().map(Value::from).collect());
                outputs.push(input.clone_with(
                    None,
                    vec![(GROUP_KEY, key.clone()), (GROUP_DOCUMENTS, docs)],
                ));
            }
        }
        Ok(outputs)
    }
}
