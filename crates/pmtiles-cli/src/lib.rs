//! Command-line front end for `pmtiles-reader`
//!
//! The binary is a thin wrapper: it parses [`cli::Cli`], opens the archive
//! with the selected reader settings and hands off to
//! [`commands::run`].

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, StrategyArg};
