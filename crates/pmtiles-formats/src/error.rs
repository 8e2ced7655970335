//! Error types for PMTiles format operations

use thiserror::Error;

/// Errors that can occur when decoding or encoding PMTiles structures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum FormatError {
    #[error("Invalid magic: expected 'PM', got {0:?}")]
    InvalidMagic([u8; 2]),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("Truncated input: needed {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Varint exceeds 10 bytes")]
    VarintTooLong,

    #[error("Varint value {value} does not fit in {field}")]
    ValueOverflow {
        /// Which entry field overflowed
        field: &'static str,
        /// The decoded value
        value: u64,
    },

    #[error("Directory is empty")]
    EmptyDirectory,

    #[error("Directory entry {index} is out of order")]
    UnsortedEntries {
        /// Index of the offending entry
        index: usize,
    },

    #[error("Directory entry {index} has an invalid offset")]
    InvalidOffset {
        /// Index of the offending entry
        index: usize,
    },

    #[error("Zoom level {0} out of range (max 26)")]
    ZoomOutOfRange(u8),

    #[error("Tile ({z}, {x}, {y}) is outside the zoom level grid")]
    CoordinateOutOfRange { z: u8, x: u32, y: u32 },

    #[error("Tile id {0} is beyond the maximum supported zoom")]
    TileIdOutOfRange(u64),

    #[error("Binary parsing error: {0}")]
    BinRw(String),
}

impl FormatError {
    /// Whether this error only means the requested tile cannot exist
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Self::ZoomOutOfRange(_) | Self::CoordinateOutOfRange { .. } | Self::TileIdOutOfRange(_)
        )
    }
}

impl From<binrw::Error> for FormatError {
    fn from(err: binrw::Error) -> Self {
        Self::BinRw(err.to_string())
    }
}

/// Result type for format operations
pub type FormatResult<T> = Result<T, FormatError>;
