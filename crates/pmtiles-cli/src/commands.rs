//! Command handlers
//!
//! Handlers write to any [`Write`] so they can be exercised without a
//! terminal.

use anyhow::{Context, Result, bail};
use pmtiles_reader::{Archive, ReaderError};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::cli::Command;

/// Temporary failure; running the command again may succeed
pub const EXIT_TEMPFAIL: i32 = 75;
/// The archive or its server can never satisfy the command as given
pub const EXIT_DATAERR: i32 = 65;

/// Process exit status for a failed command
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.chain().find_map(|cause| cause.downcast_ref::<ReaderError>()) {
        Some(reader) if reader.is_retryable() => {
            warn!("the failure looks transient, retrying may help");
            EXIT_TEMPFAIL
        }
        Some(reader) if reader.is_permanent() => EXIT_DATAERR,
        _ => 1,
    }
}

/// Run `command` against `archive`, writing its output to `out`
pub async fn run(archive: &Archive, command: &Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Show { .. } => show(archive, out).await,
        Command::Tile { z, x, y, output, .. } => tile(archive, *z, *x, *y, output.as_deref(), out).await,
        Command::Metadata { .. } => metadata(archive, out).await,
        Command::Tilejson { base_url, .. } => tilejson(archive, base_url, out).await,
    }
}

async fn show(archive: &Archive, out: &mut dyn Write) -> Result<()> {
    let header = archive.header().await.context("reading header")?;
    serde_json::to_writer_pretty(&mut *out, &*header)?;
    writeln!(out)?;
    Ok(())
}

async fn tile(
    archive: &Archive,
    z: u8,
    x: u32,
    y: u32,
    output: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    let header = archive.header().await.context("reading header")?;
    let Some(tile) = archive
        .get_tile(z, x, y, None)
        .await
        .with_context(|| format!("reading tile {z}/{x}/{y}"))?
    else {
        bail!("tile {z}/{x}/{y} not found");
    };

    match output {
        Some(path) => {
            std::fs::write(path, &tile.data).with_context(|| format!("writing {}", path.display()))?;
            info!(
                bytes = tile.data.len(),
                content_type = header.tile_type.mime_type(),
                path = %path.display(),
                "tile written"
            );
        }
        None => out.write_all(&tile.data)?,
    }
    Ok(())
}

async fn metadata(archive: &Archive, out: &mut dyn Write) -> Result<()> {
    let metadata = archive.metadata().await.context("reading metadata")?;
    serde_json::to_writer_pretty(&mut *out, &metadata)?;
    writeln!(out)?;
    Ok(())
}

async fn tilejson(archive: &Archive, base_url: &str, out: &mut dyn Write) -> Result<()> {
    let doc = archive.tile_json(base_url).await.context("building TileJSON")?;
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}
