//! Article retrieval by exact path.
//!
//! Redirects are followed by the backend, so a redirect path yields the
//! final target's content. HTML goes through the [`MarkdownPipeline`] on a
//! blocking thread; plain text is returned as-is; any other mimetype is
//! rejected without attempting to decode it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use zim_reader_core::archive::Archive;
use zim_reader_core::{MarkdownPipeline, ReadResponse, ToolError};

/// Reads the entry at `path` and returns it as Markdown.
pub async fn read_article(
    archive: &dyn Archive,
    pipeline: &Arc<MarkdownPipeline>,
    path: &str,
    cancel: &CancellationToken,
) -> Result<ReadResponse, ToolError> {
    if path.is_empty() {
        return Err(ToolError::InvalidInput("path must not be empty".to_string()));
    }

    let entry = archive
        .entry_by_path(path)
        .await
        .map_err(|e| ToolError::Load(e.to_string()))?
        .ok_or_else(|| ToolError::NotFound {
            path: path.to_string(),
        })?;

    let item = archive
        .load_item(&entry, true)
        .await
        .map_err(|e| ToolError::Load(e.to_string()))?;

    if entry.is_redirect() {
        tracing::debug!(from = %entry.path, to = %item.path, "read followed redirect");
    }

    let mimetype = item.media_type();
    match mimetype.as_str() {
        "text/html" => {
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled);
            }
            let html = String::from_utf8_lossy(&item.data).into_owned();
            let pipeline = Arc::clone(pipeline);
            let cancel = cancel.clone();
            let markdown = tokio::task::spawn_blocking(move || {
                pipeline.render_checked(&html, &|| cancel.is_cancelled())
            })
            .await
            .map_err(|e| {
                tracing::error!(path = %item.path, error = %e, "markdown conversion panicked");
                ToolError::Conversion("converter aborted".to_string())
            })??;
            Ok(ReadResponse { markdown })
        }
        "text/plain" => Ok(ReadResponse {
            markdown: String::from_utf8_lossy(&item.data).into_owned(),
        }),
        _ => Err(ToolError::UnsupportedContentType {
            mimetype: item.mimetype,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zim_reader_core::archive::memory::InMemoryArchive;

    fn archive() -> InMemoryArchive {
        let mut a = InMemoryArchive::new();
        a.add_article(
            "A/Dog",
            "Dog",
            "<html><head><title>Dog</title></head><body><h1>Dog</h1>\
             <p>See <a href=\"/A/Wolf\">wolves</a> and \
             <a href=\"https://example.com\">the site</a>.</p>\
             <img src=\"I/dog.png\" alt=\"A dog\"></body></html>",
        )
        .add_redirect("A/Doggo", "Doggo", "A/Dog")
        .add_resource("A/notes.txt", "notes", "text/plain; charset=utf-8", b"line one\n\n\n\nline two".to_vec())
        .add_resource("I/dog.png", "dog.png", "image/png", vec![0x89, b'P', b'N', b'G']);
        a
    }

    fn pipeline() -> Arc<MarkdownPipeline> {
        Arc::new(MarkdownPipeline::default())
    }

    #[tokio::test]
    async fn test_html_is_converted() {
        let a = archive();
        let resp = read_article(&a, &pipeline(), "A/Dog", &CancellationToken::new())
            .await
            .unwrap();
        assert!(resp.markdown.contains("Dog"));
        assert!(resp.markdown.contains("See wolves and [the site](https://example.com)."));
        assert!(!resp.markdown.contains("dog.png"));
        assert!(!resp.markdown.contains("A dog"));
    }

    #[tokio::test]
    async fn test_redirect_returns_target_content() {
        let a = archive();
        let p = pipeline();
        let token = CancellationToken::new();
        let direct = read_article(&a, &p, "A/Dog", &token).await.unwrap();
        let via = read_article(&a, &p, "A/Doggo", &token).await.unwrap();
        assert_eq!(direct, via);
    }

    #[tokio::test]
    async fn test_plain_text_passes_through_unchanged() {
        let a = archive();
        let resp = read_article(&a, &pipeline(), "A/notes.txt", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.markdown, "line one\n\n\n\nline two");
    }

    #[tokio::test]
    async fn test_binary_is_rejected_with_mimetype() {
        let a = archive();
        let err = read_article(&a, &pipeline(), "I/dog.png", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::UnsupportedContentType {
                mimetype: "image/png".to_string()
            }
        );
        assert!(err.to_string().contains("image/png"));
    }

    #[tokio::test]
    async fn test_missing_path_names_it() {
        let a = archive();
        let err = read_article(&a, &pipeline(), "A/Nope", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Article not found for path 'A/Nope'");
    }

    #[tokio::test]
    async fn test_cancelled_read_has_no_output() {
        let a = archive();
        let token = CancellationToken::new();
        token.cancel();
        let err = read_article(&a, &pipeline(), "A/Dog", &token)
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Cancelled);
    }
}
