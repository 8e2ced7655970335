//! Async reader for PMTiles archives
//!
#![allow(clippy::cast_possible_truncation)] // Byte offsets fit in usize on supported targets
#![allow(clippy::cast_precision_loss)] // Hit rate calculation
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::missing_errors_doc)] // Error variants are documented on ReaderError
//! Reads headers, directories and tiles from any [`Source`] that can serve
//! byte ranges: memory buffers, local files or HTTP servers with range
//! request support.
//!
//! Decoded headers and directories are kept in a [`DirectoryCache`] that
//! can be shared across many archives. The default [`SharedFutureCache`]
//! lets concurrent requests share a single in-flight read and aborts that
//! read once every caller waiting on it has cancelled.
//!
//! # Consistency
//!
//! Each read is checked against the version tag (etag) recorded with the
//! header. When the archive changes underneath the reader the header is
//! invalidated and the operation retried once; a second mismatch is
//! returned to the caller.
//!
//! # Example
//!
//! ```
//! use pmtiles_reader::{Archive, MemorySource};
//!
//! # async fn run(bytes: Vec<u8>) -> pmtiles_reader::ReaderResult<()> {
//! let archive = Archive::new(MemorySource::new("world", bytes));
//! let header = archive.header().await?;
//! println!("zoom {}..={}", header.min_zoom, header.max_zoom);
//! if let Some(tile) = archive.get_tile(0, 0, 0, None).await? {
//!     println!("{} bytes", tile.data.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod archive;
pub mod cache;
pub mod config;
pub mod decompress;
pub mod error;
pub mod resolver;
pub mod source;

pub use archive::{Archive, TileData};
pub use cache::{CacheKey, CacheStats, DirectoryCache, ResolvedValueCache, SharedFutureCache, cache_from_config};
pub use config::{CacheStrategy, ReaderConfig};
pub use decompress::{DefaultDecompressor, Decompressor};
pub use error::{ReaderError, ReaderResult};
pub use resolver::{MAX_DIRECTORY_DEPTH, TileLocation};
pub use source::{FileSource, HttpSource, MemorySource, RangeResponse, Source};

pub use pmtiles_formats;
