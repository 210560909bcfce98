//! Side-effect branches and output-appending forks.
//!
//! Both run a nested module chain over a selection of the inputs; they
//! differ only in what happens to the chain's output. [`Branch`] discards it
//! and returns the original inputs untouched, so the nested chain exists
//! purely for its side effects (writing an extra artifact, feeding a
//! collector). [`Fork`] appends the nested output after the originals, the
//! way a feed pipeline derives summary documents without losing the full
//! ones.
//!
//! The nested chain runs even when the selection is empty: chains that start
//! from a generating module (a file reader, say) produce work regardless of
//! what flowed in. Nested errors propagate either way, a branch is never a
//! place for failures to vanish.

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module, Predicate};

/// Runs a nested chain for its side effects; inputs pass through unchanged.
pub struct Branch {
    children: Vec<Box<dyn Module>>,
    predicate: Option<Predicate>,
}

impl Branch {
    pub fn new(children: Vec<Box<dyn Module>>) -> Self {
        Self {
            children,
            predicate: None,
        }
    }

    /// Hand the nested chain only the inputs satisfying `predicate`.
    pub fn filtered(predicate: Predicate, children: Vec<Box<dyn Module>>) -> Self {
        Self {
            children,
            predicate: Some(predicate),
        }
    }
}

impl Module for Branch {
    fn name(&self) -> &str {
        "branch"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let selected = select(inputs, self.predicate.as_ref(), ctx)?;
        ctx.execute_nested(&self.children, &selected)?;
        Ok(inputs.to_vec())
    }
}

/// Runs a nested chain and appends its output after the original inputs.
pub struct Fork {
    children: Vec<Box<dyn Module>>,
    predicate: Option<Predicate>,
}

impl Fork {
    pub fn new(children: Vec<Box<dyn Module>>) -> Self {
        Self {
            children,
            predicate: None,
        }
    }

    /// Hand the nested chain only the inputs satisfying `predicate`. The
    /// returned originals are still the full input set.
    pub fn filtered(predicate: Predicate, children: Vec<Box<dyn Module>>) -> Self {
        Self {
            children,
            predicate: Some(predicate),
        }
    }
}

impl Module for Fork {
    fn name(&self) -> &str {
        "fork"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let selected = select(inputs, self.predicate.as_ref(), ctx)?;
        let nested = ctx.execute_nested(&self.children, &selected)?;
        let mut outputs = inputs.to_vec();
        outputs.extend(nested);
        Ok(outputs)
    }
}

fn select(
    inputs: &[Document],
    predicate: Option<&Predicate>,
    ctx: &ExecutionContext<'_>,
) -> Result<Vec<Document>, EngineError> {
    match predicate {
        None => Ok(inputs.to_vec()),
        Some(predicate) => {
            let mut selected = Vec::new();
            for doc in inputs {
                if predicate(doc, ctx)? {
                    selected.push(doc.clone());
                }
            }
            Ok(selected)
        }
    }
}
