//! Command-line arguments
//!
//! Reader settings can be given as flags or through the same `PMTILES_*`
//! environment variables [`ReaderConfig::from_env`] understands.

use clap::{Parser, Subcommand, ValueEnum};
use pmtiles_reader::{CacheStrategy, ReaderConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Inspect PMTiles archives on disk or behind an HTTP server
#[derive(Debug, Parser)]
#[command(name = "pmtiles", version, about)]
pub struct Cli {
    /// Directory cache implementation
    #[arg(long, value_enum, env = "PMTILES_CACHE_STRATEGY", default_value = "shared", global = true)]
    pub cache_strategy: StrategyArg,

    /// Maximum number of cached headers and directories
    #[arg(long, env = "PMTILES_MAX_CACHE_ENTRIES", default_value_t = pmtiles_reader::config::DEFAULT_MAX_CACHE_ENTRIES, global = true)]
    pub max_cache_entries: usize,

    /// Bytes requested by the first read of an archive
    #[arg(long, env = "PMTILES_INITIAL_FETCH_LENGTH", default_value_t = pmtiles_reader::config::DEFAULT_INITIAL_FETCH_LENGTH, global = true)]
    pub initial_fetch_length: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PMTILES_REQUEST_TIMEOUT", default_value_t = 30, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the archive header as JSON
    Show {
        /// Local path or http(s) URL
        archive: String,
    },

    /// Extract one tile
    Tile {
        /// Local path or http(s) URL
        archive: String,
        /// Zoom level
        z: u8,
        /// Column
        x: u32,
        /// Row
        y: u32,
        /// Write the tile here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the archive's JSON metadata
    Metadata {
        /// Local path or http(s) URL
        archive: String,
    },

    /// Print a TileJSON document for the archive
    Tilejson {
        /// Local path or http(s) URL
        archive: String,
        /// URL the tiles will be served under
        base_url: String,
    },
}

impl Command {
    /// Archive location the command operates on
    pub fn archive(&self) -> &str {
        match self {
            Self::Show { archive }
            | Self::Tile { archive, .. }
            | Self::Metadata { archive }
            | Self::Tilejson { archive, .. } => archive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Share in-flight fetches between concurrent requests
    #[value(alias = "shared-future")]
    Shared,
    /// Cache completed values only
    #[value(alias = "resolved-value")]
    Resolved,
}

impl From<StrategyArg> for CacheStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Shared => Self::SharedFuture,
            StrategyArg::Resolved => Self::ResolvedValue,
        }
    }
}

impl Cli {
    /// Reader settings selected on the command line
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default()
            .with_cache_strategy(self.cache_strategy.into())
            .with_max_cache_entries(self.max_cache_entries)
            .with_initial_fetch_length(self.initial_fetch_length)
            .with_request_timeout(Duration::from_secs(self.timeout))
    }
}
