//! The built-in module library.
//!
//! Control flow combinators, document queries, content transforms, and the
//! file-system endpoints. All of them are ordinary [`Module`] implementations
//! with no special standing: a host crate can implement equivalents against
//! the same trait.
//!
//! | Module | Role |
//! |--------|------|
//! | [`Branch`] / [`Fork`] | run a nested chain for side effects, or append its output |
//! | [`ForEach`] | run a nested chain once per document |
//! | [`Switch`] | route documents to the first matching branch |
//! | [`GroupBy`] | cross inputs with groups materialized by a nested chain |
//! | [`Paginate`] | slice inputs into fixed-size pages with position metadata |
//! | [`Where`] / [`Take`] / [`OrderBy`] | filter, truncate, sort |
//! | [`ContentTransform`] / [`SetMetadata`] | set or merge content and metadata |
//! | [`ReadFiles`] / [`WriteFiles`] | bring files in, write artifacts out |
//! | [`FrontMatter`] / [`Markdown`] | parse TOML front matter, render markdown |
//!
//! [`Module`]: crate::module::Module

mod branch;
mod cond;
mod content;
mod each;
mod fs;
mod group;
mod paginate;
mod query;
mod text;

pub use branch::{Branch, Fork};
pub use cond::Switch;
pub use content::{ContentFn, ContentSource, ContentTransform, SetMetadata, ValueFn, ValueSource};
pub use each::ForEach;
pub use fs::{RELATIVE_PATH, ReadFiles, WRITE_PATH, WriteFiles};
pub use group::{GROUP_DOCUMENTS, GROUP_KEY, GroupBy, KeyFn};
pub use paginate::{HAS_NEXT, HAS_PREVIOUS, PAGE_INDEX, Paginate, TOTAL_PAGES};
pub use query::{OrderBy, Take, Where, has_meta, meta_eq, source_ext};
pub use text::{FrontMatter, Markdown};
