//! # Galley
//!
//! A content pipeline engine for generating sites and document sets.
//! Content flows through named pipelines of modules: each module takes an
//! ordered batch of immutable documents and returns a new one, and the
//! engine runs the pipelines in declared order, publishing each pipeline's
//! outputs for later pipelines to read.
//!
//! # Architecture: Seed, Execute, Publish
//!
//! Every generation runs each pipeline through the same three steps:
//!
//! ```text
//! 1. Seed      host documents (plus whatever ReadFiles adds)
//! 2. Execute   module after module, each returning fresh documents
//! 3. Publish   outputs land in the registry for later pipelines
//! ```
//!
//! This shape exists for three reasons:
//!
//! - **Determinism**: batches are ordered and parallel work rejoins in
//!   input order, so a run is reproducible regardless of scheduling.
//! - **Composability**: combinators nest whole chains inside a module, so
//!   routing and fan-out use the same building blocks as transforms.
//! - **Incrementality**: unchanged sources can skip their chain entirely
//!   and republish the outputs recorded for them last time.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`value`] | Tagged metadata values with total ordering, coercion, and lazy slots |
//! | [`document`] | Immutable documents — inline or streamed content, metadata, identity |
//! | [`config`] | Flattened TOML settings, the ambient fallback layer for metadata lookups |
//! | [`module`] | The [`Module`](module::Module) trait, execution context, and error taxonomy |
//! | [`modules`] | Built-in module library: combinators, filesystem IO, text formats, queries |
//! | [`pipeline`] | Named module chains and the ordered pipeline collection |
//! | [`engine`] | The generation loop — seeds, registry, events, reports |
//! | [`cache`] | Content-addressed execution cache with exactly-once factories |
//! | [`reuse`] | Process-once ledger mapping sources to their recorded outputs |
//! | [`parallel`] | Ordered parallel map used by per-document modules |
//! | [`output`] | CLI output formatting for progress events and the final report |
//!
//! # Design Decisions
//!
//! ## Immutable Documents
//!
//! A module never edits a document; it clones one with new content or
//! metadata. Content sits behind an `Arc`, so a clone costs two pointer
//! copies and parallel module bodies need no locks. Equality is instance
//! identity — two documents with the same text are still different
//! documents — while the cache deliberately compares by content hash so
//! value-equal documents share computed results.
//!
//! ## One Way To Nest
//!
//! Every combinator routes its children through the same nested-execution
//! call on the context: [`Branch`](modules::Branch) and
//! [`Fork`](modules::Fork) run a chain over a selection,
//! [`ForEach`](modules::ForEach) runs it per document,
//! [`Switch`](modules::Switch) routes partitions,
//! [`GroupBy`](modules::GroupBy) and [`Paginate`](modules::Paginate) run it
//! per group or page. Nesting depth is tracked on the context and shows up
//! as indentation in progress output, so a deep chain reads like a call
//! tree.
//!
//! ## Tagged Values
//!
//! Metadata is a small [`Value`](value::Value) enum rather than strings:
//! null, bool, int, float, string, sequence, document, and a lazy slot
//! that computes once on first read. Comparison is a total order across
//! kinds, so sorting document batches never panics on mixed metadata.
//!
//! ## Content-Addressed Caching
//!
//! The execution cache keys on document content hash plus a caller-chosen
//! key, not on document identity. Re-reading the same file next generation
//! gets a hit even though the instance is new, and the factory for a key
//! runs exactly once no matter how many workers ask for it concurrently.
//!
//! ## Explicit Ordered Parallelism
//!
//! Per-document modules fan out on rayon but fan back in through
//! index-assigned slots: outputs keep input order and the earliest input's
//! failure is the one reported. Parallelism changes wall-clock time, never
//! results.
//!
//! ## Process Once
//!
//! A pipeline flagged process-once hashes its sourced seeds against a
//! per-pipeline ledger. Seeds whose content is unchanged are planned out of
//! the chain and their recorded outputs re-inserted at the right positions
//! afterwards, so a one-file edit reprocesses one file.

pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod module;
pub mod modules;
pub mod output;
pub mod parallel;
pub mod pipeline;
pub mod reuse;
pub mod value;

#[cfg(test)]
pub(crate) mod test_helpers;
