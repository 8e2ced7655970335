//! Tile id to byte range resolution
//!
//! Lookup starts at the root directory. An entry with a run length marks
//! tile data; an entry with run length zero points at a leaf directory in
//! the leaf section, which is searched next. At most
//! [`MAX_DIRECTORY_DEPTH`] directories are read per lookup.

use pmtiles_formats::{FormatError, Header};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::cache::DirectoryCache;
use crate::error::{ReaderError, ReaderResult};
use crate::source::{Source, check_cancelled};

/// Root plus up to three levels of leaf directories
pub const MAX_DIRECTORY_DEPTH: usize = 4;

/// Absolute byte range of a tile payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    /// Offset from the start of the archive
    pub offset: u64,
    /// Payload length
    pub length: u64,
}

/// Absolute offset of an entry within a section starting at `base`
fn section_offset(base: u64, offset: u64) -> ReaderResult<u64> {
    base.checked_add(offset).ok_or_else(|| {
        ReaderError::Format(FormatError::ValueOverflow {
            field: "offset",
            value: offset,
        })
    })
}

/// Walks directories through a cache
pub(crate) struct TileResolver<'a> {
    source: &'a Arc<dyn Source>,
    cache: &'a dyn DirectoryCache,
}

impl<'a> TileResolver<'a> {
    pub(crate) fn new(source: &'a Arc<dyn Source>, cache: &'a dyn DirectoryCache) -> Self {
        Self { source, cache }
    }

    /// Byte range holding `tile_id`, or `None` if the archive has no such tile
    pub(crate) async fn locate(
        &self,
        header: &Header,
        tile_id: u64,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Option<TileLocation>> {
        if header.is_legacy() {
            return Err(ReaderError::UnsupportedLegacy(header.spec_version));
        }

        let mut offset = header.root_directory_offset;
        let mut length = header.root_directory_length;

        for depth in 0..MAX_DIRECTORY_DEPTH {
            check_cancelled(cancel)?;
            let directory = self
                .cache
                .get_directory(self.source, offset, length, header, cancel)
                .await?;

            let Some(entry) = directory.find_tile(tile_id) else {
                trace!(tile_id, depth, "tile not in directory");
                return Ok(None);
            };

            if !entry.is_leaf() {
                return Ok(Some(TileLocation {
                    offset: section_offset(header.tile_data_offset, entry.offset)?,
                    length: u64::from(entry.length),
                }));
            }

            trace!(tile_id, depth, leaf_offset = entry.offset, "descending into leaf directory");
            offset = section_offset(header.leaf_directory_offset, entry.offset)?;
            length = u64::from(entry.length);
        }

        Err(ReaderError::MaxDepthExceeded {
            depth: MAX_DIRECTORY_DEPTH,
        })
    }
}
