//! Filtering, slicing and ordering document streams.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module, Predicate};
use crate::value::Value;

/// True when the key resolves to exactly the given value.
pub fn meta_eq(key: impl Into<String>, value: impl Into<Value>) -> Predicate {
    let key = key.into();
    let value = value.into();
    Arc::new(move |d, _| Ok(d.get(&key).map(|v| v == value).unwrap_or(false)))
}

/// True when the key resolves at all, whatever its value.
pub fn has_meta(key: impl Into<String>) -> Predicate {
    let key = key.into();
    Arc::new(move |d, _| Ok(d.has(&key)))
}

/// True for sourced documents whose file extension matches, ignoring case.
/// Synthetic documents never match.
pub fn source_ext(ext: impl Into<String>) -> Predicate {
    let ext = ext.into();
    Arc::new(move |d, _| {
        Ok(d.source()
            .and_then(|p| p.extension())
            .map(|e| e.eq_ignore_ascii_case(&ext))
            .unwrap_or(false))
    })
}

/// Keeps only the documents the predicate accepts, preserving order.
pub struct Where {
    predicate: Predicate,
}

impl Where {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }
}

impl Module for Where {
    fn name(&self) -> &str {
        "where"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut outputs = Vec::new();
        for doc in inputs {
            if (self.predicate)(doc, ctx)? {
                outputs.push(doc.clone());
            }
        }
        Ok(outputs)
    }
}

/// Passes through at most the first `count` documents.
pub struct Take {
    count: usize,
}

impl Take {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl Module for Take {
    fn name(&self) -> &str {
        "take"
    }

    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        Ok(inputs.iter().take(self.count).cloned().collect())
    }
}

/// Stable sort by a metadata key.
///
/// Documents missing the key sort before keyed ones (after them when
/// descending). Equal keys keep their input order.
pub struct OrderBy {
    key: String,
    descending: bool,
}

impl OrderBy {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

fn compare_keys(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b),
    }
}

impl Module for OrderBy {
    fn name(&self) -> &str {
        "order-by"
    }

    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut decorated: Vec<(Option<Value>, Document)> = inputs
            .iter()
            .map(|d| (d.get(&self.key), d.clone()))
            .collect();
        decorated.sort_by(|x, y| {
            if self.descending {
                compare_keys(&y.0, &x.0)
            } else {
                compare_keys(&x.0, &y.0)
            }
        });
        Ok(decorated.into_iter().map(|(_, d)| d).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CtxHarness, doc, doc_from, doc_with};

    fn post(title: &str, weight: i64) -> Document {
        doc_with(
            title,
            vec![
                ("title", Value::from(title)),
                ("weight", Value::from(weight)),
            ],
        )
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    #[test]
    fn meta_eq_matches_exact_values_only() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let predicate = meta_eq("weight", 2);

        assert!(predicate(&post("a", 2), &ctx).unwrap());
        assert!(!predicate(&post("a", 3), &ctx).unwrap());
        assert!(!predicate(&doc("no metadata"), &ctx).unwrap());
    }

    #[test]
    fn has_meta_ignores_the_value() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let predicate = has_meta("weight");

        assert!(predicate(&post("a", 0), &ctx).unwrap());
        assert!(!predicate(&doc("bare"), &ctx).unwrap());
    }

    #[test]
    fn source_ext_is_case_insensitive_and_skips_synthetic_documents() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let predicate = source_ext("md");

        assert!(predicate(&doc_from("posts/a.md", ""), &ctx).unwrap());
        assert!(predicate(&doc_from("posts/b.MD", ""), &ctx).unwrap());
        assert!(!predicate(&doc_from("style.css", ""), &ctx).unwrap());
        assert!(!predicate(&doc("synthetic"), &ctx).unwrap());
    }

    // =========================================================================
    // Where / Take
    // =========================================================================

    #[test]
    fn where_keeps_matches_in_order() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![post("a", 1), post("b", 2), post("c", 1)];
        let module = Where::new(meta_eq("weight", 1));

        let out = module.execute(&inputs, &ctx).unwrap();
        let titles: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn where_with_no_matches_is_empty() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let module = Where::new(meta_eq("weight", 99));

        let out = module.execute(&[post("a", 1)], &ctx).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn where_propagates_predicate_errors() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let failing: Predicate = Arc::new(|_, _| Err(EngineError::module("bad predicate")));
        let module = Where::new(failing);

        assert!(module.execute(&[doc("a")], &ctx).is_err());
    }

    #[test]
    fn take_truncates_and_tolerates_short_input() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![doc("a"), doc("b"), doc("c")];

        let out = Take::new(2).execute(&inputs, &ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content().unwrap(), "a");

        let out = Take::new(10).execute(&inputs, &ctx).unwrap();
        assert_eq!(out.len(), 3);
    }

    // =========================================================================
    // OrderBy
    // =========================================================================

    #[test]
    fn order_by_sorts_ascending_by_default() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![post("b", 2), post("c", 3), post("a", 1)];

        let out = OrderBy::new("weight").execute(&inputs, &ctx).unwrap();
        let titles: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn order_by_descending_reverses_the_key_order() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![post("b", 2), post("c", 3), post("a", 1)];

        let out = OrderBy::new("weight")
            .descending()
            .execute(&inputs, &ctx)
            .unwrap();
        let titles: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[test]
    fn documents_missing_the_key_sort_first() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![post("a", 1), doc("bare"), post("b", 2)];

        let out = OrderBy::new("weight").execute(&inputs, &ctx).unwrap();
        let contents: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(contents, vec!["bare", "a", "b"]);
    }

    #[test]
    fn equal_keys_keep_their_input_order() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![post("first", 1), post("second", 1), post("third", 1)];

        let out = OrderBy::new("weight").execute(&inputs, &ctx).unwrap();
        let contents: Vec<&str> = out.iter().map(|d| d.content().unwrap()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
}
