//! Splitting a document stream into fixed-size pages.

use std::num::NonZeroUsize;

use crate::document::Document;
use crate::module::{EngineError, ExecutionContext, Module};
use crate::value::Value;

/// 1-based page number, set on every document of a page.
pub const PAGE_INDEX: &str = "page_index";

/// Total number of pages in this run.
pub const TOTAL_PAGES: &str = "total_pages";

/// Whether a later page exists.
pub const HAS_NEXT: &str = "has_next";

/// Whether an earlier page exists.
pub const HAS_PREVIOUS: &str = "has_previous";

/// Runs the child chain once per fixed-size page of the inputs.
///
/// Inputs are split in order into pages of `page_size` (the last page may
/// be short). Each page's documents are cloned with [`PAGE_INDEX`],
/// [`TOTAL_PAGES`], [`HAS_NEXT`] and [`HAS_PREVIOUS`] before the children
/// see them, and the per-page results are concatenated in page order.
/// Zero inputs mean zero pages, so the children never run.
pub struct Paginate {
    children: Vec<Box<dyn Module>>,
    page_size: NonZeroUsize,
}

impl Paginate {
    pub fn new(page_size: usize, children: Vec<Box<dyn Module>>) -> Result<Self, EngineError> {
        let page_size = NonZeroUsize::new(page_size)
            .ok_or_else(|| EngineError::config("page size must be at least 1"))?;
        Ok(Self {
            children,
            page_size,
        })
    }
}

impl std::fmt::Debug for Paginate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginate")
            .field("page_size", &self.page_size)
            .field(
                "children",
                &self.children.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Module for Paginate {
    fn name(&self) -> &str {
        "paginate"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let pages: Vec<&[Document]> = inputs.chunks(self.page_size.get()).collect();
        let total = pages.len();

        let mut outputs = Vec::new();
        for (index, page) in pages.iter().enumerate() {
            let number = index + 1;
            let annotated: Vec<Document> = page
                .iter()
                .map(|d| {
                    d.clone_with(
                        None,
                        vec![
                            (PAGE_INDEX, Value::from(number)),
                            (TOTAL_PAGES, Value::from(total)),
                            (HAS_NEXT, Value::from(number < total)),
                            (HAS_PREVIOUS, Value::from(number > 1)),
                        ],
                    )
                })
                .collect();
            outputs.extend(ctx.execute_nested(&self.children, &annotated)?);
        }
        Ok(outputs)
    }
}
