//! The engine: generations, pipeline orchestration, and the cross-pipeline
//! registry.
//!
//! An [`Engine`] owns a [`PipelineCollection`] and executes it one
//! *generation* at a time. Within a generation, pipelines run strictly in
//! declared order and each pipeline threads its document batch through its
//! modules in sequence. There is no dependency analysis between pipelines; a
//! host that needs pipeline B to see pipeline A's output declares A first.
//!
//! # The registry
//!
//! When a pipeline finishes, its outputs are published to the
//! [`DocumentRegistry`] under the pipeline's name, where later pipelines (and
//! earlier ones, on the next generation) read them. Publication replaces the
//! pipeline's previous entry wholesale; the registry holds exactly one
//! document set per pipeline, the latest.
//!
//! # Generations and retained state
//!
//! [`execute`](Engine::execute) may be called repeatedly on the same engine.
//! Each call is a fresh generation, but the execution cache, the incremental
//! reuse ledger, and the registry survive between calls. That is what makes
//! re-runs cheap: unchanged content hits the cache, process-once pipelines
//! skip unchanged sources, and cross-pipeline readers still see complete
//! output sets.
//!
//! # Failure
//!
//! The first error aborts the generation. Pipelines declared after the
//! failing one do not run; pipelines that already finished stay published.
//! There is no retry and no partial-result salvage at this level.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::cache::{CacheStats, ExecutionCache};
use crate::config::Settings;
use crate::document::{Content, Document};
use crate::module::{EngineError, ExecutionContext, run_modules};
use crate::pipeline::PipelineCollection;
use crate::reuse::ReuseLedger;
use crate::value::Value;

/// Progress and diagnostic events, sent to the host's channel as the run
/// proceeds.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    GenerationStarted {
        generation: u64,
        pipelines: usize,
    },
    PipelineStarted {
        name: String,
        seeds: usize,
    },
    ModuleStarted {
        pipeline: String,
        module: String,
        depth: usize,
        inputs: usize,
    },
    ModuleFinished {
        pipeline: String,
        module: String,
        depth: usize,
        inputs: usize,
        outputs: usize,
    },
    /// A module failed while a specific document was being processed.
    DocumentFailed {
        pipeline: String,
        module: String,
        document: String,
        message: String,
    },
    /// A module failed outside any per-document context.
    ModuleFailed {
        pipeline: String,
        module: String,
        message: String,
    },
    /// A module degraded for one document instead of failing the run.
    DocumentWarning {
        pipeline: String,
        module: String,
        document: String,
        message: String,
    },
    /// A process-once pipeline planned unchanged sources out of its chain.
    SourcesSkipped {
        pipeline: String,
        skipped: usize,
    },
    PipelineFinished {
        name: String,
        outputs: usize,
    },
    GenerationFinished {
        generation: u64,
        documents: usize,
    },
}

/// Latest published outputs per pipeline, in publication order.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    entries: Vec<(String, Vec<Document>)>,
}

impl DocumentRegistry {
    /// The latest outputs of a pipeline, or `None` if it has never
    /// published.
    pub fn get(&self, name: &str) -> Option<&[Document]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, docs)| docs.as_slice())
    }

    /// Every published document except those of `name`, in publication
    /// order.
    pub fn all_except(&self, name: &str) -> Vec<Document> {
        self.entries
            .iter()
            .filter(|(n, _)| n != name)
            .flat_map(|(_, docs)| docs.iter().cloned())
            .collect()
    }

    /// Names of pipelines that have published, in publication order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub(crate) fn publish(&mut self, name: &str, documents: Vec<Document>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = documents,
            None => self.entries.push((name.to_string(), documents)),
        }
    }
}

/// Seed documents handed to pipelines at the start of a generation.
///
/// A pipeline with no entry here starts from an empty batch, the common case
/// for pipelines whose first module produces documents itself.
#[derive(Debug, Default)]
pub struct SeedSet {
    seeds: HashMap<String, Vec<Document>>,
}

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pipeline: impl Into<String>, documents: Vec<Document>) {
        self.seeds.insert(pipeline.into(), documents);
    }

    pub fn get(&self, pipeline: &str) -> Option<&[Document]> {
        self.seeds.get(pipeline).map(Vec::as_slice)
    }
}

/// Summary of one generation, suitable for reporting and serialization.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationReport {
    pub generation: u64,
    /// Total documents published across all pipelines this generation.
    pub documents: usize,
    pub pipelines: Vec<PipelineReport>,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineReport {
    pub name: String,
    pub outputs: usize,
    /// Seeds reused from the ledger instead of being processed.
    pub skipped: usize,
}

/// Executes the pipeline collection, one generation per call.
pub struct Engine {
    pipelines: PipelineCollection,
    settings: Arc<Settings>,
    cache: ExecutionCache,
    ledger: ReuseLedger,
    registry: DocumentRegistry,
    generation: u64,
    events: Option<Sender<ExecutionEvent>>,
    app_input: Option<String>,
}

impl Engine {
    pub fn new(pipelines: PipelineCollection, settings: Settings) -> Self {
        Self {
            pipelines,
            settings: Arc::new(settings),
            cache: ExecutionCache::new(),
            ledger: ReuseLedger::new(),
            registry: DocumentRegistry::default(),
            generation: 0,
            events: None,
            app_input: None,
        }
    }

    /// Send progress events to `sender` during execution.
    pub fn with_events(mut self, sender: Sender<ExecutionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Opaque host input exposed to modules through the context.
    pub fn with_application_input(mut self, input: impl Into<String>) -> Self {
        self.app_input = Some(input.into());
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipelines(&self) -> &PipelineCollection {
        &self.pipelines
    }

    /// Mutable access for hosts that restructure the collection between
    /// generations.
    pub fn pipelines_mut(&mut self) -> &mut PipelineCollection {
        &mut self.pipelines
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ExecutionCache {
        &self.cache
    }

    /// Generations executed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Create a document outside any module, typically a seed.
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
        Document::new(Arc::clone(&self.settings), source, content, items)
    }

    /// Run one generation with empty seed batches.
    pub fn execute(&mut self) -> Result<GenerationReport, EngineError> {
        self.execute_with_seeds(&SeedSet::default())
    }

    /// Run one generation, handing each pipeline its seed batch.
    pub fn execute_with_seeds(&mut self, seeds: &SeedSet) -> Result<GenerationReport, EngineError> {
        self.generation += 1;
        let generation = self.generation;
        self.emit(ExecutionEvent::GenerationStarted {
            generation,
            pipelines: self.pipelines.len(),
        });

        let names = self.pipelines.names();
        let mut reports = Vec::with_capacity(names.len());
        for name in &names {
            reports.push(self.run_pipeline(name, seeds)?);
        }

        let documents = reports.iter().map(|r| r.outputs).sum();
        self.emit(ExecutionEvent::GenerationFinished {
            generation,
            documents,
        });
        Ok(GenerationReport {
            generation,
            documents,
            pipelines: reports,
            cache: self.cache.stats(),
        })
    }

    fn run_pipeline(&mut self, name: &str, seeds: &SeedSet) -> Result<PipelineReport, EngineError> {
        let seed_docs = seeds.get(name).unwrap_or(&[]);
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| EngineError::config(format!("no pipeline named '{}'", name)))?;
        self.emit(ExecutionEvent::PipelineStarted {
            name: name.to_string(),
            seeds: seed_docs.len(),
        });

        let (outputs, skipped) = if pipeline.is_process_once() {
            let plan = self.ledger.plan(name, seed_docs)?;
            let skipped = plan.skipped();
            if skipped > 0 {
                self.emit(ExecutionEvent::SourcesSkipped {
                    pipeline: name.to_string(),
                    skipped,
                });
            }
            let chain_outputs = {
                let ctx = ExecutionContext::new(
                    name,
                    &self.settings,
                    &self.cache,
                    &self.registry,
                    self.events.as_ref(),
                    self.app_input.as_deref(),
                );
                run_modules(pipeline.modules(), plan.to_process(), &ctx)?
            };
            (self.ledger.commit(name, plan, chain_outputs), skipped)
        } else {
            let ctx = ExecutionContext::new(
                name,
                &self.settings,
                &self.cache,
                &self.registry,
                self.events.as_ref(),
                self.app_input.as_deref(),
            );
            (run_modules(pipeline.modules(), seed_docs, &ctx)?, 0)
        };

        self.emit(ExecutionEvent::PipelineFinished {
            name: name.to_string(),
            outputs: outputs.len(),
        });
        let report = PipelineReport {
            name: name.to_string(),
            outputs: outputs.len(),
            skipped,
        };
        self.registry.publish(name, outputs);
        Ok(report)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}
