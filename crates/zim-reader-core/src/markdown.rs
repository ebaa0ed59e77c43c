//! HTML-to-Markdown post-processor.
//!
//! Turns raw article HTML into compact Markdown for model consumption.
//! The stages run in a fixed order:
//!
//! 1. **Structural conversion** by an [`HtmlConverter`]. The default
//!    [`HtmdConverter`] removes images, `<picture>` and `<svg>` elements
//!    together with their whole subtree before anything is rendered, so
//!    no alt text or caption markup nested inside them survives.
//! 2. **Link normalization** ([`normalize_links`]): empty links are
//!    deleted, relative/internal links collapse to their text, and
//!    absolute `http(s)` links are kept verbatim.
//! 3. **Whitespace normalization** ([`collapse_newlines`]): runs of three
//!    or more newlines become exactly two.
//!
//! Only stage 1 can fail. Stages 2 and 3 are total and pure.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;

use crate::error::ToolError;

/// Elements dropped before conversion because they carry no readable text.
pub const BASE_REMOVED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Elements dropped before conversion to save tokens.
pub const MEDIA_REMOVED_TAGS: &[&str] = &["img", "picture", "svg"];

// Destination is either `<...>` or a run without spaces that may hold one
// level of balanced parentheses (`Rust_(programming_language)`). An
// optional quoted title follows. Link text may wrap across lines.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[([^\]]*)\]\((<[^>]*>|(?:[^()\s]|\([^()\s]*\))*)(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#,
    )
    .unwrap()
});

static NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Structural HTML-to-Markdown rendering engine.
pub trait HtmlConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String>;
}

/// [`HtmlConverter`] backed by the `htmd` CommonMark renderer.
#[derive(Debug, Clone)]
pub struct HtmdConverter {
    skip_tags: Vec<&'static str>,
}

impl HtmdConverter {
    pub fn new() -> Self {
        let mut skip_tags = BASE_REMOVED_TAGS.to_vec();
        skip_tags.extend_from_slice(MEDIA_REMOVED_TAGS);
        Self { skip_tags }
    }

    /// Tags whose whole subtree is dropped before rendering.
    pub fn skip_tags(&self) -> &[&'static str] {
        &self.skip_tags
    }
}

impl Default for HtmdConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlConverter for HtmdConverter {
    fn convert(&self, html: &str) -> Result<String> {
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(self.skip_tags.clone())
            .build();
        Ok(converter.convert(html)?)
    }
}

/// Rewrites every `[text](target)` construct.
///
/// - blank `text` → removed entirely
/// - `target` URL without an `http://` or `https://` scheme → just `text`
/// - otherwise → left exactly as written
///
/// An optional `<...>` wrapper around the URL is ignored when checking
/// the scheme.
pub fn normalize_links(markdown: &str) -> String {
    LINK_RE
        .replace_all(markdown, |caps: &regex::Captures| {
            let whole = &caps[0];
            let text = &caps[1];
            let destination = &caps[2];

            if text.trim().is_empty() {
                return String::new();
            }

            let url = destination
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_ascii_lowercase();
            if url.starts_with("http://") || url.starts_with("https://") {
                whole.to_string()
            } else {
                text.to_string()
            }
        })
        .into_owned()
}

/// Collapses every run of three or more `\n` into exactly two.
///
/// Idempotent: `collapse_newlines(collapse_newlines(s)) == collapse_newlines(s)`.
pub fn collapse_newlines(markdown: &str) -> String {
    NEWLINES_RE.replace_all(markdown, "\n\n").into_owned()
}

/// The ordered conversion pipeline shared by every `read` call.
#[derive(Clone)]
pub struct MarkdownPipeline {
    converter: Arc<dyn HtmlConverter>,
}

impl MarkdownPipeline {
    pub fn new(converter: Arc<dyn HtmlConverter>) -> Self {
        Self { converter }
    }

    /// Runs all stages to completion.
    pub fn render(&self, html: &str) -> Result<String, ToolError> {
        self.render_checked(html, &|| false)
    }

    /// Runs all stages, consulting `is_cancelled` between stages.
    ///
    /// A cancelled run returns [`ToolError::Cancelled`] and no partial output.
    pub fn render_checked(
        &self,
        html: &str,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<String, ToolError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| ToolError::Conversion(e.to_string()))?;
        if is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let markdown = normalize_links(&markdown);
        if is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        Ok(collapse_newlines(&markdown))
    }
}

impl Default for MarkdownPipeline {
    fn default() -> Self {
        Self::new(Arc::new(HtmdConverter::new()))
    }
}
