//! # ZIM Reader
//!
//! Serves an offline content archive to AI tools over MCP. Two tools are
//! exposed: `search` (ranked full-text search) and `read` (an article as
//! compact Markdown).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │  stdio /   │──▶│ ToolRegistry │──▶│ search / read   │
//! │  HTTP MCP  │   │  (dispatch)  │   │  operations     │
//! └────────────┘   └──────┬───────┘   └───────┬─────────┘
//!                         │                   │
//!                      Envelope        ┌──────┴────────┐
//!                                      ▼               ▼
//!                               SqliteArchive   MarkdownPipeline
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! zim-reader pack ./site wiki.sqlite        # build an archive
//! zim-reader -z wiki.sqlite search "dog"    # one-off search
//! zim-reader -z wiki.sqlite                 # MCP over stdio
//! zim-reader -z wiki.sqlite --listen 127.0.0.1:4545
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and CLI overrides |
//! | [`db`] | SQLite connection pools |
//! | [`sqlite_archive`] | SQLite archive backend |
//! | [`pack`] | Build archives from a directory |
//! | [`search`] | The `search` operation |
//! | [`read`] | The `read` operation |
//! | [`schema`] | Argument validation |
//! | [`envelope`] | Success/failure result wrapper |
//! | [`traits`] | `Tool` trait and dispatcher |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | stdio and HTTP transports |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod db;
pub mod envelope;
pub mod logging;
pub mod mcp;
pub mod pack;
pub mod read;
pub mod schema;
pub mod search;
pub mod server;
pub mod sqlite_archive;
pub mod traits;
