//! Incremental reuse for pipelines flagged "process once".
//!
//! The ledger remembers, per pipeline and per source, the content hash last
//! processed and the output documents that processing produced. On the next
//! generation, seed documents whose source is known and whose content hash
//! is unchanged are planned out of the module chain; after the reduced chain
//! runs, their recorded outputs are spliced back into the published result
//! in the original seed order. Downstream pipelines always see a set
//! equivalent to "everything reprocessed".
//!
//! Reprocessing is triggered only by a content change for a source, never by
//! the source name alone. A seed without a source has no identity to track,
//! so it is processed every generation and its outputs ride along at the end
//! of the merged result. Sources must be unique within one seed set; a
//! duplicate is refused as a configuration error rather than recorded
//! ambiguously.
//!
//! A cache-style miss (source never seen, content changed) is normal control
//! flow here, not an error.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::document::Document;
use crate::module::EngineError;

/// Per-source state once a pipeline has processed it.
#[derive(Debug)]
struct SourceRecord {
    content_hash: String,
    outputs: Vec<Document>,
}

#[derive(Debug, Default)]
struct PipelineLedger {
    sources: HashMap<PathBuf, SourceRecord>,
}

/// Reuse state for every process-once pipeline, carried across generations.
#[derive(Debug, Default)]
pub struct ReuseLedger {
    pipelines: HashMap<String, PipelineLedger>,
}

/// One seed's fate for this generation, in original seed order.
#[derive(Debug)]
enum PlanEntry {
    /// Source unchanged: the module chain never sees it; these recorded
    /// outputs stand in for it.
    Skip { outputs: Vec<Document> },
    /// New source, changed content, or no source to track.
    Process {
        source: Option<PathBuf>,
        content_hash: Option<String>,
    },
}

/// The partition of one pipeline's seed set for one generation.
#[derive(Debug)]
pub struct ReusePlan {
    entries: Vec<PlanEntry>,
    to_process: Vec<Document>,
}

impl ReusePlan {
    /// Seeds the module chain should actually run on, in seed order.
    pub fn to_process(&self) -> &[Document] {
        &self.to_process
    }

    /// How many seeds were planned out of the chain.
    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PlanEntry::Skip { .. }))
            .count()
    }
}

impl ReuseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `seeds` into documents to process and documents whose
    /// recorded outputs can be reused.
    ///
    /// The ledger records one entry per source path, so a seed set naming
    /// the same source twice has no representable state; planning refuses it
    /// before the chain runs. Hashing may realize a seed's content stream,
    /// hence the error path.
    pub fn plan(&self, pipeline: &str, seeds: &[Document]) -> Result<ReusePlan, EngineError> {
        let ledger = self.pipelines.get(pipeline);
        let mut entries = Vec::with_capacity(seeds.len());
        let mut to_process = Vec::new();
        let mut seen = HashSet::new();

        for seed in seeds {
            let source = seed.source().map(PathBuf::from);
            if let Some(path) = &source {
                if !seen.insert(path.clone()) {
                    return Err(EngineError::config(format!(
                        "duplicate source {} in seeds for process-once pipeline '{}'",
                        path.display(),
                        pipeline
                    )));
                }
            }
            let hash = match source {
                Some(_) => Some(seed.content_hash()?.to_string()),
                None => None,
            };

            let record = match (&source, ledger) {
                (Some(path), Some(ledger)) => ledger.sources.get(path),
                _ => None,
            };
            match (record, &hash) {
                (Some(record), Some(hash)) if record.content_hash == *hash => {
                    entries.push(PlanEntry::Skip {
                        outputs: record.outputs.clone(),
                    });
                }
                _ => {
                    entries.push(PlanEntry::Process {
                        source: source.clone(),
                        content_hash: hash,
                    });
                    to_process.push(seed.clone());
                }
            }
        }

        Ok(ReusePlan {
            entries,
            to_process,
        })
    }

    /// Merge the chain's outputs with the plan's reused outputs and update
    /// the recorded state.
    ///
    /// Chain outputs are attributed to processed seeds by source, so the
    /// merged result keeps the original seed order: each seed's slot holds
    /// either its reused outputs or whatever the chain produced for its
    /// source. Outputs without a source, or with a source no processed seed
    /// had, follow at the end in chain order.
    pub fn commit(
        &mut self,
        pipeline: &str,
        plan: ReusePlan,
        chain_outputs: Vec<Document>,
    ) -> Vec<Document> {
        let processed_sources: Vec<&PathBuf> = plan
            .entries
            .iter()
            .filter_map(|e| match e {
                PlanEntry::Process {
                    source: Some(path), ..
                } => Some(path),
                _ => None,
            })
            .collect();

        let mut attributed: HashMap<PathBuf, Vec<Document>> = HashMap::new();
        let mut leftovers = Vec::new();
        for output in chain_outputs {
            match output.source() {
                Some(path) if processed_sources.iter().any(|s| s.as_path() == path) => {
                    attributed.entry(path.to_path_buf()).or_default().push(output);
                }
                _ => leftovers.push(output),
            }
        }

        let ledger = self.pipelines.entry(pipeline.to_string()).or_default();
        let mut merged = Vec::new();
        for entry in plan.entries {
            match entry {
                PlanEntry::Skip { outputs } => merged.extend(outputs),
                PlanEntry::Process {
                    source: Some(path),
                    content_hash: Some(hash),
                } => {
                    let outputs = attributed.remove(&path).unwrap_or_default();
                    merged.extend(outputs.iter().cloned());
                    ledger.sources.insert(
                        path,
                        SourceRecord {
                            content_hash: hash,
                            outputs,
                        },
                    );
                }
                PlanEntry::Process { .. } => {}
            }
        }
        merged.extend(leftovers);
        merged
    }
}
