//! Text formats: TOML front matter and Markdown rendering.

use pulldown_cmark::{Parser, html as md_html};

use crate::config::Settings;
use crate::document::{Content, Document};
use crate::module::{EngineError, ExecutionContext, Module};
use crate::parallel;
use crate::value::Value;

const DELIMITER: &str = "+++";

/// Splits `+++`-delimited TOML front matter from the body.
///
/// `Ok(None)` means the text has no front matter at all. An opening
/// delimiter that is never closed is an error, not content.
fn split_front_matter(text: &str) -> Result<Option<(&str, &str)>, String> {
    let Some(rest) = text.strip_prefix(DELIMITER) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return Ok(None);
    };

    for (idx, _) in rest.match_indices(DELIMITER) {
        let starts_line = idx == 0 || rest.as_bytes()[idx - 1] == b'\n';
        let tail = &rest[idx + DELIMITER.len()..];
        let ends_line = tail.is_empty() || tail.starts_with('\n') || tail.starts_with("\r\n");
        if starts_line && ends_line {
            let header = &rest[..idx];
            let body = tail
                .strip_prefix("\r\n")
                .or_else(|| tail.strip_prefix('\n'))
                .unwrap_or(tail);
            return Ok(Some((header, body)));
        }
    }
    Err("front matter is never closed".to_string())
}

/// Extracts `+++`-delimited TOML front matter into document metadata.
///
/// A document with front matter comes out with the header's keys merged
/// into its metadata (tables flattened to dotted keys) and the remaining
/// body as content. Documents without front matter pass through untouched.
///
/// Malformed front matter fails the document. In lenient mode it instead
/// passes through unparsed with a diagnostic.
pub struct FrontMatter {
    lenient: bool,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self { lenient: false }
    }

    /// Pass malformed front matter through with a warning instead of
    /// failing the document.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    fn reject(
        &self,
        doc: &Document,
        ctx: &ExecutionContext<'_>,
        message: String,
        outputs: &mut Vec<Document>,
    ) -> Result<(), EngineError> {
        if self.lenient {
            ctx.warn("front-matter", doc, message);
            outputs.push(doc.clone());
            Ok(())
        } else {
            Err(EngineError::for_document(doc, EngineError::module(message)))
        }
    }
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FrontMatter {
    fn name(&self) -> &str {
        "front-matter"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            match split_front_matter(doc.content()?) {
                Ok(None) => outputs.push(doc.clone()),
                Ok(Some((header, body))) => match Settings::from_toml_str(header) {
                    Ok(parsed) => {
                        let items: Vec<(String, Value)> = parsed
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.clone()))
                            .collect();
                        outputs.push(doc.clone_with(Some(Content::from(body)), items));
                    }
                    Err(e) => {
                        self.reject(doc, ctx, format!("invalid front matter: {e}"), &mut outputs)?;
                    }
                },
                Err(reason) => self.reject(doc, ctx, reason, &mut outputs)?,
            }
        }
        Ok(outputs)
    }
}

/// Renders each document's content from Markdown to HTML.
///
/// Rendering is keyed in the execution cache by content hash, so re-rendering
/// an unchanged document across generations is a lookup, not a parse.
pub struct Markdown;

impl Module for Markdown {
    fn name(&self) -> &str {
        "markdown"
    }

    fn execute(
        &self,
        inputs: &[Document],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Document>, EngineError> {
        parallel::map_ordered(inputs, |_, doc| {
            let html = ctx.cache().get_or_compute(doc, "markdown", |d| {
                let parser = Parser::new(d.content()?);
                let mut html = String::new();
                md_html::push_html(&mut html, parser);
                Ok::<_, EngineError>(html)
            })?;
            Ok(doc.clone_with(Some(Content::from(html.as_str())), None::<(&str, Value)>))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionEvent;
    use crate::test_helpers::{CtxHarness, doc, doc_with};
    use std::sync::mpsc;

    // =========================================================================
    // FrontMatter
    // =========================================================================

    #[test]
    fn header_keys_become_metadata_and_the_body_remains() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let text = "+++\ntitle = \"Hello\"\nweight = 3\n+++\nBody text\n";

        let out = FrontMatter::new().execute(&[doc(text)], &ctx).unwrap();
        assert_eq!(out[0].content().unwrap(), "Body text\n");
        assert_eq!(out[0].get_local("title"), Some(Value::from("Hello")));
        assert_eq!(out[0].get_as::<i64>("weight").unwrap(), 3);
    }

    #[test]
    fn tables_flatten_to_dotted_keys() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let text = "+++\n[author]\nname = \"Ada\"\n+++\nx";

        let out = FrontMatter::new().execute(&[doc(text)], &ctx).unwrap();
        assert_eq!(out[0].get_local("author.name"), Some(Value::from("Ada")));
    }

    #[test]
    fn documents_without_front_matter_pass_through_unchanged() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![doc("plain body"), doc("+++not a delimiter line")];

        let out = FrontMatter::new().execute(&inputs, &ctx).unwrap();
        assert_eq!(out, inputs);
        assert_eq!(out[1].content().unwrap(), "+++not a delimiter line");
    }

    #[test]
    fn empty_front_matter_just_strips_the_delimiters() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();

        let out = FrontMatter::new()
            .execute(&[doc("+++\n+++\nbody")], &ctx)
            .unwrap();
        assert_eq!(out[0].content().unwrap(), "body");
    }

    #[test]
    fn unterminated_front_matter_fails_the_document() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();

        let err = FrontMatter::new()
            .execute(&[doc("+++\ntitle = \"x\"\nno closing")], &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn invalid_toml_fails_the_document_in_strict_mode() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();

        let err = FrontMatter::new()
            .execute(&[doc("+++\nnot == toml\n+++\nbody")], &ctx)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("invalid front matter"));
        assert!(message.contains("synthetic document"));
    }

    #[test]
    fn lenient_mode_passes_through_and_warns() {
        let harness = CtxHarness::new();
        let (sender, receiver) = mpsc::channel();
        let ctx = harness.ctx_with_events(&sender);
        let inputs = vec![doc("+++\nnot == toml\n+++\nbody")];

        let out = FrontMatter::new().lenient().execute(&inputs, &ctx).unwrap();
        assert_eq!(out, inputs);

        let warned = receiver.try_iter().any(|event| {
            matches!(
                event,
                ExecutionEvent::DocumentWarning { ref module, .. } if module == "front-matter"
            )
        });
        assert!(warned);
    }

    // =========================================================================
    // Markdown
    // =========================================================================

    #[test]
    fn renders_markdown_to_html() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();

        let out = Markdown
            .execute(&[doc("# Title\n\nSome *emphasis* here.")], &ctx)
            .unwrap();
        let html = out[0].content().unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn rendering_keeps_metadata_and_order() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();
        let inputs = vec![
            doc_with("# One", vec![("n", Value::from(1))]),
            doc_with("# Two", vec![("n", Value::from(2))]),
        ];

        let out = Markdown.execute(&inputs, &ctx).unwrap();
        assert!(out[0].content().unwrap().contains("One"));
        assert!(out[1].content().unwrap().contains("Two"));
        assert_eq!(out[0].get_as::<i64>("n").unwrap(), 1);
        assert_eq!(out[1].get_as::<i64>("n").unwrap(), 2);
    }

    #[test]
    fn rendering_unchanged_content_hits_the_cache() {
        let harness = CtxHarness::new();
        let ctx = harness.ctx();

        Markdown.execute(&[doc("# Same")], &ctx).unwrap();
        // A fresh instance with identical content is a lookup, not a parse.
        let out = Markdown.execute(&[doc("# Same")], &ctx).unwrap();
        assert!(out[0].content().unwrap().contains("<h1>Same</h1>"));

        let stats = harness.cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }
}
