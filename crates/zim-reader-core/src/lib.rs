//! # ZIM Reader Core
//!
//! Shared, runtime-free logic for ZIM Reader: the archive capability
//! traits, the result models returned to callers, the per-call error
//! taxonomy, title sanitization, and the HTML-to-Markdown post-processor.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Backends that
//! need a runtime (the SQLite archive) live in the application crate and
//! implement [`archive::Archive`] from here.

pub mod archive;
pub mod error;
pub mod markdown;
pub mod models;
pub mod sanitize;

pub use archive::{Archive, ArchiveInfo, Entry, Item, Query, SearchHit, SearchResults, Searcher};
pub use error::ToolError;
pub use markdown::{HtmdConverter, HtmlConverter, MarkdownPipeline};
pub use models::{ReadResponse, SearchResponse, SearchResultItem};
