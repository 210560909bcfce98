//! CLI output formatting for execution progress and the final report.
//!
//! # Progress Display
//!
//! Output follows the event stream. Each pipeline leads with a `==>` header
//! line; the module traffic below it is indented one level per nesting
//! depth, showing document counts in and out:
//!
//! ```text
//! ==> Pipeline content (2 seeds)
//!     read-files: 2 → 14
//!     front-matter: 14 → 14
//!         markdown: 6 → 6
//!     write-files: 14 → 14
//!     14 documents out
//! ```
//!
//! Failures and warnings use a two-level pattern: a header naming the
//! pipeline and module, then indented context lines with the source
//! document and the message.
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure, with no I/O and no side effects. Events that carry
//! nothing worth a line format to an empty `Vec`.

use crate::engine::{ExecutionEvent, GenerationReport};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format one execution event as display lines.
pub fn format_event(event: &ExecutionEvent) -> Vec<String> {
    match event {
        ExecutionEvent::GenerationStarted {
            generation,
            pipelines,
        } => {
            vec![format!("Generation {} ({} pipelines)", generation, pipelines)]
        }
        ExecutionEvent::PipelineStarted { name, seeds } => {
            if *seeds > 0 {
                vec![format!("==> Pipeline {} ({} seeds)", name, seeds)]
            } else {
                vec![format!("==> Pipeline {}", name)]
            }
        }
        // The finished event carries the counts; started stays silent.
        ExecutionEvent::ModuleStarted { .. } => vec![],
        ExecutionEvent::ModuleFinished {
            module,
            depth,
            inputs,
            outputs,
            ..
        } => {
            vec![format!(
                "{}{}: {} \u{2192} {}",
                indent(depth + 1),
                module,
                inputs,
                outputs
            )]
        }
        ExecutionEvent::DocumentFailed {
            pipeline,
            module,
            document,
            message,
        } => {
            vec![
                format!("Error in {}/{}", pipeline, module),
                format!("    Source: {}", document),
                format!("    {}", message),
            ]
        }
        ExecutionEvent::ModuleFailed {
            pipeline,
            module,
            message,
        } => {
            vec![
                format!("Error in {}/{}", pipeline, module),
                format!("    {}", message),
            ]
        }
        ExecutionEvent::DocumentWarning {
            pipeline,
            module,
            document,
            message,
        } => {
            vec![
                format!("Warning in {}/{}", pipeline, module),
                format!("    Source: {}", document),
                format!("    {}", message),
            ]
        }
        ExecutionEvent::SourcesSkipped { skipped, .. } => {
            vec![format!("    {} sources unchanged, reusing output", skipped)]
        }
        ExecutionEvent::PipelineFinished { outputs, .. } => {
            vec![format!("    {} documents out", outputs)]
        }
        ExecutionEvent::GenerationFinished {
            generation,
            documents,
        } => {
            vec![
                String::new(),
                format!("Generation {} complete: {} documents", generation, documents),
            ]
        }
    }
}

/// Print one execution event to stdout.
pub fn print_event(event: &ExecutionEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Generation report
// ============================================================================

/// Format the end-of-run summary: per-pipeline document counts, cache
/// traffic, and the total.
pub fn format_generation_report(report: &GenerationReport) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("Pipelines".to_string());
    for pipeline in &report.pipelines {
        let reused = if pipeline.skipped > 0 {
            format!(" ({} sources reused)", pipeline.skipped)
        } else {
            String::new()
        };
        lines.push(format!(
            "    {}: {} documents{}",
            pipeline.name, pipeline.outputs, reused
        ));
    }
    lines.push(format!("Cache: {}", report.cache));
    lines.push(format!("Total: {} documents", report.documents));
    lines
}

/// Print the end-of-run summary to stdout.
pub fn print_generation_report(report: &GenerationReport) {
    for line in format_generation_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::engine::PipelineReport;

    // =========================================================================
    // Event formatting tests
    // =========================================================================

    #[test]
    fn pipeline_header_mentions_seeds_only_when_present() {
        let with = format_event(&ExecutionEvent::PipelineStarted {
            name: "content".to_string(),
            seeds: 2,
        });
        assert_eq!(with, vec!["==> Pipeline content (2 seeds)"]);

        let without = format_event(&ExecutionEvent::PipelineStarted {
            name: "assets".to_string(),
            seeds: 0,
        });
        assert_eq!(without, vec!["==> Pipeline assets"]);
    }

    #[test]
    fn module_started_is_silent() {
        let lines = format_event(&ExecutionEvent::ModuleStarted {
            pipeline: "content".to_string(),
            module: "markdown".to_string(),
            depth: 0,
            inputs: 3,
        });
        assert!(lines.is_empty());
    }

    #[test]
    fn module_lines_indent_with_nesting_depth() {
        let top = format_event(&ExecutionEvent::ModuleFinished {
            pipeline: "content".to_string(),
            module: "markdown".to_string(),
            depth: 0,
            inputs: 3,
            outputs: 3,
        });
        assert_eq!(top, vec!["    markdown: 3 \u{2192} 3"]);

        let nested = format_event(&ExecutionEvent::ModuleFinished {
            pipeline: "content".to_string(),
            module: "where".to_string(),
            depth: 2,
            inputs: 3,
            outputs: 1,
        });
        assert_eq!(nested, vec!["            where: 3 \u{2192} 1"]);
    }

    #[test]
    fn document_failure_shows_source_and_message() {
        let lines = format_event(&ExecutionEvent::DocumentFailed {
            pipeline: "content".to_string(),
            module: "front-matter".to_string(),
            document: "posts/bad.md".to_string(),
            message: "invalid front matter: expected value".to_string(),
        });
        assert_eq!(lines[0], "Error in content/front-matter");
        assert_eq!(lines[1], "    Source: posts/bad.md");
        assert_eq!(lines[2], "    invalid front matter: expected value");
    }

    #[test]
    fn module_failure_has_no_source_line() {
        let lines = format_event(&ExecutionEvent::ModuleFailed {
            pipeline: "content".to_string(),
            module: "read-files".to_string(),
            message: "cannot read content: not found".to_string(),
        });
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Error in content/read-files");
    }

    #[test]
    fn warnings_mirror_the_failure_shape() {
        let lines = format_event(&ExecutionEvent::DocumentWarning {
            pipeline: "content".to_string(),
            module: "front-matter".to_string(),
            document: "posts/odd.md".to_string(),
            message: "invalid front matter: junk".to_string(),
        });
        assert_eq!(lines[0], "Warning in content/front-matter");
        assert_eq!(lines[1], "    Source: posts/odd.md");
    }

    #[test]
    fn skipped_sources_show_as_a_context_line() {
        let lines = format_event(&ExecutionEvent::SourcesSkipped {
            pipeline: "content".to_string(),
            skipped: 7,
        });
        assert_eq!(lines, vec!["    7 sources unchanged, reusing output"]);
    }

    #[test]
    fn generation_bookends() {
        let start = format_event(&ExecutionEvent::GenerationStarted {
            generation: 3,
            pipelines: 2,
        });
        assert_eq!(start, vec!["Generation 3 (2 pipelines)"]);

        let end = format_event(&ExecutionEvent::GenerationFinished {
            generation: 3,
            documents: 15,
        });
        assert_eq!(end, vec!["".to_string(), "Generation 3 complete: 15 documents".to_string()]);
    }

    // =========================================================================
    // Report formatting tests
    // =========================================================================

    fn sample_report() -> GenerationReport {
        GenerationReport {
            generation: 1,
            documents: 15,
            pipelines: vec![
                PipelineReport {
                    name: "content".to_string(),
                    outputs: 12,
                    skipped: 0,
                },
                PipelineReport {
                    name: "assets".to_string(),
                    outputs: 3,
                    skipped: 2,
                },
            ],
            cache: CacheStats { hits: 5, misses: 2 },
        }
    }

    #[test]
    fn report_lists_pipelines_cache_and_total() {
        let lines = format_generation_report(&sample_report());
        assert_eq!(lines[0], "Pipelines");
        assert_eq!(lines[1], "    content: 12 documents");
        assert_eq!(lines[2], "    assets: 3 documents (2 sources reused)");
        assert_eq!(lines[3], "Cache: 5 cached, 2 computed (7 total)");
        assert_eq!(lines[4], "Total: 15 documents");
    }
}
