//! Title sanitization for search results.
//!
//! Search engines report titles as stored in the archive, which can hold
//! entity escapes (`&lt;b&gt;`) and inline markup. Results returned to
//! callers carry plain text only.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Removes anything that looks like a markup tag.
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// Decodes HTML entities, then strips tags, then trims.
///
/// Decoding runs first so that escaped markup (`&lt;b&gt;`) is also
/// removed once it turns into real tags.
pub fn sanitize_title(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    strip_tags(&decoded).trim().to_string()
}
