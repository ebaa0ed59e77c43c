//! Configuration parsing.
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags. Every section has defaults, so an empty file (or no
//! file at all) is valid as long as an archive path is supplied somehow.
//!
//! ```toml
//! [archive]
//! path = "wiki.sqlite"
//! max_connections = 4
//!
//! [search]
//! default_count = 20
//! max_count = 100
//!
//! [server]
//! listen = "127.0.0.1:4545"
//!
//! [log]
//! level = "info"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Path to the archive file. Required before serving.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Result count used when a `search` call omits `count`.
    #[serde(default = "default_count")]
    pub default_count: i64,
    /// Upper bound applied to a requested `count`.
    #[serde(default = "default_max_count")]
    pub max_count: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: default_max_count(),
        }
    }
}

fn default_count() -> i64 {
    20
}
fn default_max_count() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    /// Address for the HTTP transport. Absent means stdio.
    #[serde(default)]
    pub listen: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `zim_reader=debug`).
    #[serde(default)]
    pub level: Option<String>,
}

impl Config {
    /// Applies command-line overrides on top of file values.
    pub fn with_overrides(mut self, archive: Option<PathBuf>, listen: Option<String>) -> Self {
        if archive.is_some() {
            self.archive.path = archive;
        }
        if listen.is_some() {
            self.server.listen = listen;
        }
        self
    }

    /// Returns the archive path or a startup error naming the missing flag.
    pub fn archive_path(&self) -> Result<&Path> {
        self.archive.path.as_deref().context(
            "no archive given: pass --archive <path> (or -z) or set [archive].path in the config file",
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.default_count < 1 {
            bail!("search.default_count must be >= 1");
        }
        if self.search.max_count < self.search.default_count {
            bail!("search.max_count must be >= search.default_count");
        }
        if self.archive.max_connections == 0 {
            bail!("archive.max_connections must be > 0");
        }
        Ok(())
    }
}

/// Loads and validates the config file.
///
/// A missing file is only an error when `required` is set (the user named
/// it explicitly); otherwise defaults are used.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    if !path.exists() && !required {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
