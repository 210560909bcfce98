//! Conditional routing over a branch list.

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module, Predicate};

/// Routes each document to the first branch whose predicate accepts it.
///
/// Branches are tried in declaration order and a matched document is
/// consumed: it leaves the pool and later branches never see it. Each
/// branch's chain runs once over everything it matched (skipped entirely
/// when it matched nothing). Documents no branch matched pass through
/// unchanged, unless an [`otherwise`](Switch::otherwise) chain is declared,
/// which then receives all of them.
///
/// The output is each branch's results in declaration order, followed by the
/// pass-through (or `otherwise`) documents.
///
/// A single `when` with no `otherwise` is the plain "if" form.
pub struct Switch {
    branches: Vec<(Predicate, Vec<Box<dyn Module>>)>,
    default: Option<Vec<Box<dyn Module>>>,
}

impl Switch {
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            default: None,
        }
    }

    /// Add a branch. Declaration order is match order.
    pub fn when(mut self, predicate: Predicate, children: Vec<Box<dyn Module>>) -> Self {
        self.branches.push((predicate, children));
        self
    }

    /// Chain for documents no branch matched. Without it they pass through.
    pub fn otherwise(mut self, children: Vec<Box<dyn Module>>) -> Self {
        self.default = Some(children);
        self
    }
}

impl Default for Switch {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Switch {
    fn name(&self) -> &str {
        "switch"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut pool: Vec<Document> = inputs.to_vec();
        let mut outputs = Vec::new();

        for (predicate, children) in &self.branches {
            let mut matched = Vec::new();
            let mut remaining = Vec::with_capacity(pool.len());
            for doc in pool {
                if predicate(&doc, ctx)? {
                    matched.push(doc);
                } else {
                    remaining.push(doc);
                }
            }
            pool = remaining;
            if !matched.is_empty() {
                outputs.extend(ctx.execute_nested(children, &matched)?);
            }
        }

        match &self.default {
            Some(children) if !pool.is_empty() => {
                outputs.extend(ctx.execute_nested(children, &pool)?);
            }
            Some(_) => {}
            None => outputs.extend(pool),
        }
        Ok(outputs)
    }
}
