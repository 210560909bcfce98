//! Reading documents from and writing them to the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::document::{Content, Document};
use crate::module::{EngineError, ExecutionContext, Module};
use crate::parallel;
use crate::value::Value;

/// Path of a read file relative to the scan root, set by [`ReadFiles`].
pub const RELATIVE_PATH: &str = "relative_path";

/// Target path relative to the output root. [`WriteFiles`] prefers it over
/// [`RELATIVE_PATH`] and records the path it actually wrote under this key.
pub const WRITE_PATH: &str = "write_path";

/// Reads files under a root directory into documents.
///
/// The tree is walked recursively, matched paths are sorted, and each file
/// becomes one document: its source is the full path, its content the file
/// text, and [`RELATIVE_PATH`] the path below the root. Inputs pass through
/// ahead of the read documents.
pub struct ReadFiles {
    root: PathBuf,
    extensions: Vec<String>,
}

impl ReadFiles {
    /// Read every file under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
        }
    }

    /// Read only files with one of the given extensions, ignoring case.
    pub fn with_extensions(root: impl Into<PathBuf>, extensions: &[&str]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn wants(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|e| self.extensions.iter().any(|want| e.eq_ignore_ascii_case(want)))
            .unwrap_or(false)
    }
}

impl Module for ReadFiles {
    fn name(&self) -> &str {
        "read-files"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.wants(entry.path()) {
                continue;
            }
            paths.push(entry.into_path());
        }
        paths.sort();

        let mut outputs = inputs.to_vec();
        for path in paths {
            let text = fs::read_to_string(&path)
                .map_err(|e| EngineError::module(format!("cannot read {}: {e}", path.display())))?;
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .display()
                .to_string();
            outputs.push(ctx.new_document(
                Some(path),
                Content::from(text),
                vec![(RELATIVE_PATH, Value::from(relative))],
            ));
        }
        Ok(outputs)
    }
}

/// Writes each document's content under an output root.
///
/// The target is the document's [`WRITE_PATH`], falling back to
/// [`RELATIVE_PATH`]; a document carrying neither is an error. Parent
/// directories are created as needed and writes run in parallel. Each
/// output is the input with [`WRITE_PATH`] set to the path written.
pub struct WriteFiles {
    root: PathBuf,
    extension: Option<String>,
}

impl WriteFiles {
    /// Write each document to its target path as-is.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: None,
        }
    }

    /// Write with the target path's extension swapped, e.g. `md` to `html`.
    pub fn with_extension(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: Some(extension.into()),
        }
    }

    fn write_one(&self, doc: &Document) -> Result<Document, EngineError> {
        let mut relative = doc
            .get_as::<PathBuf>(WRITE_PATH)
            .or_else(|_| doc.get_as::<PathBuf>(RELATIVE_PATH))
            .map_err(|_| {
                EngineError::module(format!(
                    "document has neither {WRITE_PATH} nor {RELATIVE_PATH} metadata"
                ))
            })?;
        if let Some(extension) = &self.extension {
            relative.set_extension(extension);
        }

        let full = self.root.join(&relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::module(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&full, doc.content()?)
            .map_err(|e| EngineError::module(format!("cannot write {}: {e}", full.display())))?;

        Ok(doc.clone_with(
            None,
            vec![(WRITE_PATH, Value::from(relative.display().to_string()))],
        ))
    }
}

impl Module for WriteFiles {
    fn name(&self) -> &str {
        "write-files"
    }

    fn execute(
        &self,
        inputs: &[Document],
        _ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        parallel::map_ordered(inputs, |_, doc| {
            self.write_one(doc)
                .map_err(|e| EngineError::for_document(doc, e))
        })
    }
}
