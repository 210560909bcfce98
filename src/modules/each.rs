//! Per-document nested execution.

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module};

/// Runs a nested chain once per input document, concatenating the results.
///
/// Depth-first: document N's nested run completes before document N+1's
/// begins, so peak memory is bounded by one document's intermediate state
/// rather than the whole batch's. Output order follows input order, with
/// each document's nested results in place.
pub struct ForEach {
    children: Vec<Box<dyn Module>>,
}

impl ForEach {
    pub fn new(children: Vec<Box<dyn Module>>) -> Self {
        Self { children }
    }
}

impl Module for ForEach {
    fn name(&self) -> &str {
        "for-each"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let nested = ctx.execute_nested(&self.children, std::slice::from_ref(doc))?;
            outputs.extend(nested);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Content;
    use crate::test_helpers::{CtxHarness, FailWith, Recorder, doc};
    use crate::value::Value;

    /// Emits two numbered variants of each input.
    struct Duplicate;

    impl Module for Duplicate {
        fn name(&self) -> &str {
            "duplicate"
        }

        fn execute(
            &self,
            inputs: &[Document],
            _ctx: &ExecutionContext<'_>,
        ) -> Result<Vec<Document>, EngineError> {
            let mut out = Vec::new();
            for d in inputs {
                for n in 1..=2 {
                    let text = format!("{}-{}", d.content()?, n);
                    out.push(d.clone_with(Some(Content::from(text)), None::<(&str, Value)>));
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn children_run_once_per_document() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let (recorder, log) = Recorder::new("rec");
        let each = ForEach::new(vec![Box::new(recorder)]);

        each.execute(&[doc("a"), doc("b")], &ctx).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[test]
    fn results_concatenate_depth_first() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let each = ForEach::new(vec![Box::new(Duplicate)]);

        let out = each.execute(&[doc("a"), doc("b")], &ctx).unwrap();
        let contents: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(contents, vec!["a-1", "a-2", "b-1", "b-2"]);
    }

    #[test]
    fn empty_input_makes_no_nested_calls() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let (recorder, log) = Recorder::new("rec");
        let each = ForEach::new(vec![Box::new(recorder)]);

        let out = each.execute(&[], &ctx).unwrap();
        assert!(out.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn a_failing_document_aborts_the_batch() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let each = ForEach::new(vec![Box::new(FailWith("bad document"))]);

        assert!(each.execute(&[doc("a")], &ctx).is_err());
    }
}
