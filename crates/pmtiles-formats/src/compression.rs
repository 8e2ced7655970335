//! Compression and tile type tags stored in the header

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compression applied to directories, metadata, or tile payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Compression was not recorded
    Unknown,
    /// Stored as-is
    None,
    /// Gzip
    Gzip,
    /// Brotli
    Brotli,
    /// Zstandard
    Zstd,
    /// A tag this crate does not know about
    Unrecognized(u8),
}

impl Compression {
    /// Tag byte as stored in the header
    pub const fn tag(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::None => 1,
            Self::Gzip => 2,
            Self::Brotli => 3,
            Self::Zstd => 4,
            Self::Unrecognized(tag) => tag,
        }
    }
}

impl From<u8> for Compression {
    fn from(tag: u8) -> Self {
        match tag {
            0 => Self::Unknown,
            1 => Self::None,
            2 => Self::Gzip,
            3 => Self::Brotli,
            4 => Self::Zstd,
            other => Self::Unrecognized(other),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::None => f.write_str("none"),
            Self::Gzip => f.write_str("gzip"),
            Self::Brotli => f.write_str("brotli"),
            Self::Zstd => f.write_str("zstd"),
            Self::Unrecognized(tag) => write!(f, "unrecognized({tag})"),
        }
    }
}

/// Format of the tile payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    /// Type was not recorded
    Unknown,
    /// Mapbox Vector Tile
    Mvt,
    /// PNG raster
    Png,
    /// JPEG raster
    Jpeg,
    /// WebP raster
    Webp,
    /// AVIF raster
    Avif,
    /// A tag this crate does not know about
    Unrecognized(u8),
}

impl TileType {
    /// Tag byte as stored in the header
    pub const fn tag(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Mvt => 1,
            Self::Png => 2,
            Self::Jpeg => 3,
            Self::Webp => 4,
            Self::Avif => 5,
            Self::Unrecognized(tag) => tag,
        }
    }

    /// Conventional file extension, without the dot
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mvt => "mvt",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Unknown | Self::Unrecognized(_) => "",
        }
    }

    /// MIME type for serving the tile
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mvt => "application/x-protobuf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Unknown | Self::Unrecognized(_) => "application/octet-stream",
        }
    }
}

impl From<u8> for TileType {
    fn from(tag: u8) -> Self {
        match tag {
            0 => Self::Unknown,
            1 => Self::Mvt,
            2 => Self::Png,
            3 => Self::Jpeg,
            4 => Self::Webp,
            5 => Self::Avif,
            other => Self::Unrecognized(other),
        }
    }
}
