//! # ZIM Reader CLI (`zim-reader`)
//!
//! ## Usage
//!
//! ```bash
//! zim-reader [--config zim-reader.toml] [-z ARCHIVE] [--listen ADDR] [COMMAND]
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `zim-reader serve` | Serve MCP (stdio, or HTTP with `--listen`). The default |
//! | `zim-reader search "<query>"` | Run the `search` tool and print its envelope |
//! | `zim-reader read <path>` | Run the `read` tool and print its envelope |
//! | `zim-reader tools` | List registered tools and their schemas |
//! | `zim-reader info` | Summarize the archive |
//! | `zim-reader pack <dir> [out]` | Build an archive from a directory |
//!
//! ## Examples
//!
//! ```bash
//! # Build an archive from a static site dump
//! zim-reader pack ./wiki-dump wiki.sqlite --exclude "drafts/**"
//!
//! # Search it from the shell
//! zim-reader -z wiki.sqlite search "domestic dog" --count 5
//!
//! # Claude Desktop / Cursor entry
//! #   { "command": "zim-reader", "args": ["-z", "/data/wiki.sqlite"] }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;

use zim_reader::config::{self, Config};
use zim_reader::logging;
use zim_reader::pack::{self, PackOptions};
use zim_reader::server;
use zim_reader::sqlite_archive::SqliteArchive;
use zim_reader::traits::{ToolContext, ToolRegistry};
use zim_reader_core::Archive;

const DEFAULT_CONFIG: &str = "./zim-reader.toml";

/// ZIM Reader: offline archive search and reading for AI tools.
#[derive(Parser)]
#[command(
    name = "zim-reader",
    about = "Serve an offline content archive to AI tools over MCP",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to `./zim-reader.toml`
    /// when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Archive file to open. Overrides `[archive].path`.
    #[arg(short = 'z', long, global = true)]
    archive: Option<PathBuf>,

    /// Serve over HTTP at this address instead of stdio. Overrides `[server].listen`.
    #[arg(long, global = true)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tools over MCP.
    Serve,

    /// Search the archive.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        count: Option<i64>,
    },

    /// Read an article as Markdown.
    Read {
        /// Exact entry path, as printed by `search`.
        path: String,
    },

    /// List registered tools.
    Tools,

    /// Print a summary of the archive.
    Info,

    /// Build an archive from a directory tree.
    Pack {
        /// Directory to pack.
        dir: PathBuf,

        /// Output file. Defaults to `<dir>.sqlite`.
        out: Option<PathBuf>,

        /// Glob of files to include (repeatable). Defaults to everything.
        #[arg(long = "include")]
        include: Vec<String>,

        /// Glob of files to skip (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Do not build the full-text index.
        #[arg(long)]
        no_index: bool,

        /// Overwrite the output file if it exists.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, required) = match &cli.config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let cfg = config::load_config(&config_path, required)?.with_overrides(cli.archive, cli.listen);

    let command = cli.command.unwrap_or(Commands::Serve);
    let http = matches!(command, Commands::Serve) && cfg.server.listen.is_some();
    logging::init_tracing(cfg.log.level.as_deref(), if http { "info" } else { "warn" });

    match command {
        Commands::Tools => {
            let infos = ToolRegistry::with_builtins().infos();
            println!("{}", serde_json::to_string_pretty(&json!({ "tools": infos }))?);
        }
        Commands::Pack {
            dir,
            out,
            include,
            exclude,
            no_index,
            force,
        } => {
            let out = match out {
                Some(out) => out,
                None => pack::default_output(&dir)?,
            };
            let mut opts = PackOptions {
                exclude_globs: exclude,
                fulltext_index: !no_index,
                force,
                ..Default::default()
            };
            if !include.is_empty() {
                opts.include_globs = include;
            }
            let summary = pack::pack_directory(&dir, &out, &opts).await?;
            println!(
                "Packed {} entries ({} articles, {} redirects, {} indexed) into {}",
                summary.entries,
                summary.articles,
                summary.redirects,
                summary.indexed,
                out.display()
            );
        }
        Commands::Serve => {
            let archive = open_archive(&cfg).await?;
            let result = serve(&cfg, archive.clone()).await;
            archive.close().await;
            result?;
        }
        Commands::Info => {
            let archive = open_archive(&cfg).await?;
            let info = archive.describe().await;
            archive.close().await;
            let mut value = serde_json::to_value(info?)?;
            value["path"] = json!(archive.path().display().to_string());
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Search { query, count } => {
            let mut params = json!({ "query": query });
            if let Some(count) = count {
                params["count"] = json!(count);
            }
            run_tool(&cfg, "search", params).await?;
        }
        Commands::Read { path } => {
            run_tool(&cfg, "read", json!({ "path": path })).await?;
        }
    }

    Ok(())
}

/// Opens the configured archive. Any failure here is fatal.
async fn open_archive(cfg: &Config) -> Result<Arc<SqliteArchive>> {
    let path: &Path = cfg.archive_path()?;
    let archive = SqliteArchive::open(path, cfg.archive.max_connections).await?;
    Ok(Arc::new(archive))
}

async fn serve(cfg: &Config, archive: Arc<SqliteArchive>) -> Result<()> {
    let tools = Arc::new(ToolRegistry::with_builtins());
    let ctx = ToolContext::new(archive, Arc::new(cfg.clone()));
    match cfg.server.listen.as_deref() {
        Some(addr) => server::serve_http(addr, tools, ctx).await,
        None => server::serve_stdio(tools, ctx).await,
    }
}

/// Runs one tool call, prints the envelope, and exits 1 on failure.
async fn run_tool(cfg: &Config, name: &str, params: serde_json::Value) -> Result<()> {
    let archive = open_archive(cfg).await?;
    let ctx = ToolContext::new(archive.clone(), Arc::new(cfg.clone()));
    let envelope = ToolRegistry::with_builtins().call(name, params, &ctx).await;
    archive.close().await;

    println!("{}", serde_json::to_string_pretty(&envelope.to_json())?);
    if envelope.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
