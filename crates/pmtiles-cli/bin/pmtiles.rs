//! `pmtiles` binary entry point.
//!
//! Parses arguments, initializes logging, opens the archive and runs the
//! selected command. Logs go to stderr so tile bytes on stdout stay clean.

use anyhow::{Context, Result};
use clap::Parser;
use pmtiles_cli::{Cli, commands};
use pmtiles_reader::Archive;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(commands::exit_code(&err));
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // reqwest is built without a bundled crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let config = cli.reader_config();
    config.validate()?;

    let location = cli.command.archive();
    tracing::debug!(archive = location, strategy = ?config.cache_strategy, "opening archive");
    let archive = Archive::open(location, &config).with_context(|| format!("opening {location}"))?;

    let mut stdout = std::io::stdout().lock();
    commands::run(&archive, &cli.command, &mut stdout).await?;

    let stats = archive.cache().stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "cache stats");
    Ok(())
}
