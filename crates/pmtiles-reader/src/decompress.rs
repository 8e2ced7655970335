//! Payload decompression

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use pmtiles_formats::Compression;
use std::io::Read;

use crate::error::{ReaderError, ReaderResult};

/// Turns stored bytes back into their uncompressed form
#[async_trait]
pub trait Decompressor: Send + Sync {
    /// Decompress `data` stored with `compression`
    async fn decompress(&self, data: Bytes, compression: Compression) -> ReaderResult<Bytes>;
}

/// Handles uncompressed and gzip payloads
///
/// Any other compression fails with [`ReaderError::UnsupportedCompression`];
/// plug in a custom [`Decompressor`] to read brotli or zstd archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecompressor;

#[async_trait]
impl Decompressor for DefaultDecompressor {
    async fn decompress(&self, data: Bytes, compression: Compression) -> ReaderResult<Bytes> {
        match compression {
            Compression::None | Compression::Unknown => Ok(data),
            Compression::Gzip => gunzip(&data).map(Bytes::from),
            other => Err(ReaderError::UnsupportedCompression(other)),
        }
    }
}

fn gunzip(data: &[u8]) -> ReaderResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ReaderError::Decompression(e.to_string()))?;
    Ok(out)
}
