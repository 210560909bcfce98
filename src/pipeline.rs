//! Named pipelines and the ordered collection the engine executes.
//!
//! A [`Pipeline`] is a name plus an ordered module list. The
//! [`PipelineCollection`] keeps pipelines in declared order and addressable
//! by name; the engine executes them strictly in collection order, so hosts
//! that need a pipeline to run earlier or later say so structurally, with
//! [`insert_before`](PipelineCollection::insert_before) and friends, rather
//! than through any dependency analysis.
//!
//! Collection mistakes (duplicate names, unknown targets, out-of-range
//! indexes) are configuration errors and surface when the collection is
//! built, before anything executes.

use crate::module::{EngineError, Module};

/// A named, ordered list of modules.
pub struct Pipeline {
    name: String,
    modules: Vec<Box<dyn Module>>,
    process_once: bool,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            process_once: false,
        }
    }

    pub fn with_modules(name: impl Into<String>, modules: Vec<Box<dyn Module>>) -> Self {
        Self {
            name: name.into(),
            modules,
            process_once: false,
        }
    }

    /// Append a module stage.
    pub fn add(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Mark this pipeline for incremental reuse: seed documents whose
    /// content is unchanged since the last generation skip the module chain
    /// and their recorded outputs are re-inserted instead.
    pub fn process_once(mut self, enabled: bool) -> Self {
        self.process_once = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }

    pub fn is_process_once(&self) -> bool {
        self.process_once
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("process_once", &self.process_once)
            .finish()
    }
}

/// Ordered, name-addressable set of pipelines.
#[derive(Default)]
pub struct PipelineCollection {
    pipelines: Vec<Pipeline>,
}

impl PipelineCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pipeline at the end of the execution order.
    pub fn add(&mut self, pipeline: Pipeline) -> Result<(), EngineError> {
        self.check_name_free(pipeline.name())?;
        self.pipelines.push(pipeline);
        Ok(())
    }

    /// Insert at a position in the execution order.
    pub fn insert(&mut self, index: usize, pipeline: Pipeline) -> Result<(), EngineError> {
        self.check_name_free(pipeline.name())?;
        if index > self.pipelines.len() {
            return Err(EngineError::config(format!(
                "pipeline index {} out of range (have {})",
                index,
                self.pipelines.len()
            )));
        }
        self.pipelines.insert(index, pipeline);
        Ok(())
    }

    /// Insert so the new pipeline runs immediately before `target`.
    pub fn insert_before(&mut self, target: &str, pipeline: Pipeline) -> Result<(), EngineError> {
        let index = self.require_position(target)?;
        self.insert(index, pipeline)
    }

    /// Insert so the new pipeline runs immediately after `target`.
    pub fn insert_after(&mut self, target: &str, pipeline: Pipeline) -> Result<(), EngineError> {
        let index = self.require_position(target)?;
        self.insert(index + 1, pipeline)
    }

    /// Remove a pipeline by name. Returns it, or `None` if absent.
    pub fn remove(&mut self, name: &str) -> Option<Pipeline> {
        let index = self.position(name)?;
        Some(self.pipelines.remove(index))
    }

    /// Remove the pipeline at a position. Returns it, or `None` when out of
    /// range.
    pub fn remove_at(&mut self, index: usize) -> Option<Pipeline> {
        if index < self.pipelines.len() {
            Some(self.pipelines.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name() == name)
    }

    /// Position of a pipeline in the execution order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.pipelines.iter().position(|p| p.name() == name)
    }

    /// Pipelines in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.iter()
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.pipelines.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn check_name_free(&self, name: &str) -> Result<(), EngineError> {
        if self.position(name).is_some() {
            return Err(EngineError::config(format!(
                "duplicate pipeline name '{}'",
                name
            )));
        }
        Ok(())
    }

    fn require_position(&self, name: &str) -> Result<usize, EngineError> {
        self.position(name)
            .ok_or_else(|| EngineError::config(format!("no pipeline named '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::module::ExecutionContext;

    struct Noop(&'static str);

    impl Module for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(
            &self,
            inputs: &[Document],
            _ctx: &ExecutionContext<'_>,
        ) -> Result<Vec<Document>, EngineError> {
            Ok(inputs.to_vec())
        }
    }

    fn named(name: &str) -> Pipeline {
        Pipeline::new(name).add(Noop("noop"))
    }

    fn collection(names: &[&str]) -> PipelineCollection {
        let mut c = PipelineCollection::new();
        for name in names {
            c.add(named(name)).unwrap();
        }
        c
    }

    // =========================================================================
    // Ordering operations
    // =========================================================================

    #[test]
    fn add_appends_in_order() {
        let c = collection(&["content", "assets", "feeds"]);
        assert_eq!(c.names(), vec!["content", "assets", "feeds"]);
    }

    #[test]
    fn insert_before_and_after_target() {
        let mut c = collection(&["a", "c"]);
        c.insert_before("c", named("b")).unwrap();
        c.insert_after("c", named("d")).unwrap();
        assert_eq!(c.names(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn insert_at_index() {
        let mut c = collection(&["a", "c"]);
        c.insert(1, named("b")).unwrap();
        assert_eq!(c.names(), vec!["a", "b", "c"]);

        let err = c.insert(9, named("z")).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn remove_by_name_and_index() {
        let mut c = collection(&["a", "b", "c"]);
        assert_eq!(c.remove("b").map(|p| p.name().to_string()), Some("b".into()));
        assert!(c.remove("b").is_none());
        assert_eq!(
            c.remove_at(0).map(|p| p.name().to_string()),
            Some("a".into())
        );
        assert!(c.remove_at(5).is_none());
        assert_eq!(c.names(), vec!["c"]);
    }

    // =========================================================================
    // Configuration errors
    // =========================================================================

    #[test]
    fn duplicate_names_are_rejected() {
        let mut c = collection(&["content"]);
        let err = c.add(named("content")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.to_string().contains("duplicate pipeline name"));
    }

    #[test]
    fn unknown_insert_target_is_rejected() {
        let mut c = collection(&["a"]);
        let err = c.insert_before("missing", named("b")).unwrap_err();
        assert!(err.to_string().contains("no pipeline named 'missing'"));
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[test]
    fn lookup_by_name_and_position() {
        let c = collection(&["a", "b"]);
        assert!(c.get("b").is_some());
        assert!(c.get("z").is_none());
        assert_eq!(c.position("b"), Some(1));
        assert_eq!(c.len(), 2);
        assert!(!c.is_empty());
    }

    #[test]
    fn process_once_flag_round_trips() {
        let p = Pipeline::new("content").process_once(true);
        assert!(p.is_process_once());
        assert!(!Pipeline::new("other").is_process_once());
    }
}
