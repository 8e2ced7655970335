//! Archive header
//!
//! The v3 header is a fixed 127-byte little-endian block at the start of
//! the archive. Older v1/v2 archives are recognised and routed to
//! [`crate::legacy`].

use crate::compression::{Compression, TileType};
use crate::error::{FormatError, FormatResult};
use crate::legacy;
use binrw::{BinRead, BinWrite};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Size of a v3 header in bytes
pub const HEADER_SIZE: usize = 127;

/// Two-byte signature shared by every archive version
pub const MAGIC: [u8; 2] = *b"PM";

/// Highest format version this crate reads
pub const MAX_SPEC_VERSION: u8 = 3;

const FULL_MAGIC: [u8; 7] = *b"PMTiles";
const COORD_SCALE: f64 = 10_000_000.0;

/// On-disk layout of the v3 header
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
struct RawHeader {
    magic: [u8; 7],
    spec_version: u8,
    root_directory_offset: u64,
    root_directory_length: u64,
    metadata_offset: u64,
    metadata_length: u64,
    leaf_directory_offset: u64,
    leaf_directory_length: u64,
    tile_data_offset: u64,
    tile_data_length: u64,
    num_addressed_tiles: u64,
    num_tile_entries: u64,
    num_tile_contents: u64,
    clustered: u8,
    internal_compression: u8,
    tile_compression: u8,
    tile_type: u8,
    min_zoom: u8,
    max_zoom: u8,
    min_lon_e7: i32,
    min_lat_e7: i32,
    max_lon_e7: i32,
    max_lat_e7: i32,
    center_zoom: u8,
    center_lon_e7: i32,
    center_lat_e7: i32,
}

/// Decoded archive header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Format version; 1 and 2 mean a legacy archive
    pub spec_version: u8,
    /// Byte offset of the root directory
    pub root_directory_offset: u64,
    /// Byte length of the root directory
    pub root_directory_length: u64,
    /// Byte offset of the JSON metadata
    pub metadata_offset: u64,
    /// Byte length of the JSON metadata
    pub metadata_length: u64,
    /// Byte offset of the leaf directory section
    pub leaf_directory_offset: u64,
    /// Byte length of the leaf directory section
    pub leaf_directory_length: u64,
    /// Byte offset of the tile data section
    pub tile_data_offset: u64,
    /// Byte length of the tile data section
    pub tile_data_length: u64,
    /// Number of tiles addressable by id
    pub num_addressed_tiles: u64,
    /// Number of directory entries
    pub num_tile_entries: u64,
    /// Number of distinct tile payloads
    pub num_tile_contents: u64,
    /// Whether tile data is ordered by tile id
    pub clustered: bool,
    /// Compression of directories and metadata
    pub internal_compression: Compression,
    /// Compression of tile payloads
    pub tile_compression: Compression,
    /// Format of tile payloads
    pub tile_type: TileType,
    /// Lowest zoom level present
    pub min_zoom: u8,
    /// Highest zoom level present
    pub max_zoom: u8,
    /// Western bound in degrees
    pub min_lon: f64,
    /// Southern bound in degrees
    pub min_lat: f64,
    /// Eastern bound in degrees
    pub max_lon: f64,
    /// Northern bound in degrees
    pub max_lat: f64,
    /// Suggested initial zoom level
    pub center_zoom: u8,
    /// Suggested initial longitude
    pub center_lon: f64,
    /// Suggested initial latitude
    pub center_lat: f64,
    /// Version tag of the source the header was read from
    pub etag: Option<String>,
}

impl Header {
    /// Create an empty v3 header
    pub fn new() -> Self {
        Self {
            spec_version: MAX_SPEC_VERSION,
            root_directory_offset: HEADER_SIZE as u64,
            root_directory_length: 0,
            metadata_offset: HEADER_SIZE as u64,
            metadata_length: 0,
            leaf_directory_offset: HEADER_SIZE as u64,
            leaf_directory_length: 0,
            tile_data_offset: HEADER_SIZE as u64,
            tile_data_length: 0,
            num_addressed_tiles: 0,
            num_tile_entries: 0,
            num_tile_contents: 0,
            clustered: true,
            internal_compression: Compression::None,
            tile_compression: Compression::None,
            tile_type: TileType::Unknown,
            min_zoom: 0,
            max_zoom: 0,
            min_lon: -180.0,
            min_lat: -85.0,
            max_lon: 180.0,
            max_lat: 85.0,
            center_zoom: 0,
            center_lon: 0.0,
            center_lat: 0.0,
            etag: None,
        }
    }

    /// Decode a header from the first bytes of an archive
    ///
    /// `bytes` must hold at least the 127-byte v3 header. For legacy
    /// archives it should also cover the embedded JSON metadata, otherwise
    /// zoom and bounds fall back to defaults.
    pub fn from_bytes(bytes: &[u8], etag: Option<String>) -> FormatResult<Self> {
        if bytes.len() < MAGIC.len() {
            return Err(FormatError::Truncated {
                needed: MAGIC.len(),
                actual: bytes.len(),
            });
        }
        if bytes[..2] != MAGIC {
            return Err(FormatError::InvalidMagic([bytes[0], bytes[1]]));
        }

        if let Some(version) = legacy::detect_version(bytes) {
            return legacy::parse_header(bytes, version, etag);
        }

        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                needed: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let spec_version = bytes[7];
        if spec_version > MAX_SPEC_VERSION {
            return Err(FormatError::UnsupportedVersion(spec_version));
        }

        let raw = RawHeader::read_le(&mut Cursor::new(&bytes[..HEADER_SIZE]))?;
        Ok(Self::from_raw(&raw, etag))
    }

    fn from_raw(raw: &RawHeader, etag: Option<String>) -> Self {
        Self {
            spec_version: raw.spec_version,
            root_directory_offset: raw.root_directory_offset,
            root_directory_length: raw.root_directory_length,
            metadata_offset: raw.metadata_offset,
            metadata_length: raw.metadata_length,
            leaf_directory_offset: raw.leaf_directory_offset,
            leaf_directory_length: raw.leaf_directory_length,
            tile_data_offset: raw.tile_data_offset,
            tile_data_length: raw.tile_data_length,
            num_addressed_tiles: raw.num_addressed_tiles,
            num_tile_entries: raw.num_tile_entries,
            num_tile_contents: raw.num_tile_contents,
            clustered: raw.clustered == 1,
            internal_compression: Compression::from(raw.internal_compression),
            tile_compression: Compression::from(raw.tile_compression),
            tile_type: TileType::from(raw.tile_type),
            min_zoom: raw.min_zoom,
            max_zoom: raw.max_zoom,
            min_lon: f64::from(raw.min_lon_e7) / COORD_SCALE,
            min_lat: f64::from(raw.min_lat_e7) / COORD_SCALE,
            max_lon: f64::from(raw.max_lon_e7) / COORD_SCALE,
            max_lat: f64::from(raw.max_lat_e7) / COORD_SCALE,
            center_zoom: raw.center_zoom,
            center_lon: f64::from(raw.center_lon_e7) / COORD_SCALE,
            center_lat: f64::from(raw.center_lat_e7) / COORD_SCALE,
            etag,
        }
    }

    /// Serialize as a v3 header
    pub fn to_bytes(&self) -> FormatResult<Vec<u8>> {
        let raw = RawHeader {
            magic: FULL_MAGIC,
            spec_version: MAX_SPEC_VERSION,
            root_directory_offset: self.root_directory_offset,
            root_directory_length: self.root_directory_length,
            metadata_offset: self.metadata_offset,
            metadata_length: self.metadata_length,
            leaf_directory_offset: self.leaf_directory_offset,
            leaf_directory_length: self.leaf_directory_length,
            tile_data_offset: self.tile_data_offset,
            tile_data_length: self.tile_data_length,
            num_addressed_tiles: self.num_addressed_tiles,
            num_tile_entries: self.num_tile_entries,
            num_tile_contents: self.num_tile_contents,
            clustered: u8::from(self.clustered),
            internal_compression: self.internal_compression.tag(),
            tile_compression: self.tile_compression.tag(),
            tile_type: self.tile_type.tag(),
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            min_lon_e7: to_e7(self.min_lon),
            min_lat_e7: to_e7(self.min_lat),
            max_lon_e7: to_e7(self.max_lon),
            max_lat_e7: to_e7(self.max_lat),
            center_zoom: self.center_zoom,
            center_lon_e7: to_e7(self.center_lon),
            center_lat_e7: to_e7(self.center_lat),
        };

        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        raw.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Whether this header came from a v1/v2 archive
    pub fn is_legacy(&self) -> bool {
        self.spec_version < MAX_SPEC_VERSION
    }

    /// Whether tiles at `zoom` can exist in this archive
    pub fn contains_zoom(&self, zoom: u8) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }

    /// `[west, south, east, north]`
    pub fn bounds(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// `[lon, lat, zoom]`
    pub fn center(&self) -> [f64; 3] {
        [self.center_lon, self.center_lat, f64::from(self.center_zoom)]
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

fn to_e7(degrees: f64) -> i32 {
    (degrees * COORD_SCALE).round() as i32
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_header() -> Header {
        Header {
            root_directory_offset: 127,
            root_directory_length: 25,
            metadata_offset: 152,
            metadata_length: 247,
            leaf_directory_offset: 399,
            leaf_directory_length: 0,
            tile_data_offset: 399,
            tile_data_length: 69,
            num_addressed_tiles: 1,
            num_tile_entries: 1,
            num_tile_contents: 1,
            internal_compression: Compression::Gzip,
            tile_compression: Compression::Gzip,
            tile_type: TileType::Mvt,
            max_zoom: 14,
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 0.999_999_9,
            max_lat: 1.0,
            center_lon: 0.0,
            center_lat: 0.0,
            ..Header::new()
        }
    }

    #[test]
    fn test_header_size() {
        let bytes = sample_header().to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..7], b"PMTiles");
        assert_eq!(bytes[7], 3);
    }

    #[test]
    fn test_field_offsets() {
        let bytes = sample_header().to_bytes().unwrap();
        let u64_at = |pos: usize| u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap());
        let i32_at = |pos: usize| i32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
        assert_eq!(u64_at(8), 127);
        assert_eq!(u64_at(24), 152);
        assert_eq!(u64_at(56), 399);
        assert_eq!(u64_at(88), 1);
        assert_eq!(bytes[96], 1);
        assert_eq!(bytes[97], 2);
        assert_eq!(bytes[99], 1);
        assert_eq!(bytes[101], 14);
        assert_eq!(i32_at(110), 9_999_999);
        assert_eq!(i32_at(114), 10_000_000);
    }

    #[test]
    fn test_decode_restores_fields() {
        let header = sample_header();
        let bytes = header.to_bytes().unwrap();
        let decoded = Header::from_bytes(&bytes, Some("abc".to_string())).unwrap();
        assert_eq!(decoded, Header {
            etag: Some("abc".to_string()),
            ..header
        });
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = sample_header().to_bytes().unwrap();
        bytes.extend_from_slice(&[0xaa; 64]);
        assert!(Header::from_bytes(&bytes, None).is_ok());
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut bytes = sample_header().to_bytes().unwrap();
        bytes[0] = b'X';
        assert_eq!(
            Header::from_bytes(&bytes, None),
            Err(FormatError::InvalidMagic([b'X', b'M']))
        );
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = sample_header().to_bytes().unwrap();
        bytes[7] = 4;
        assert_eq!(
            Header::from_bytes(&bytes, None),
            Err(FormatError::UnsupportedVersion(4))
        );
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = sample_header().to_bytes().unwrap();
        assert!(matches!(
            Header::from_bytes(&bytes[..100], None),
            Err(FormatError::Truncated { needed: 127, actual: 100 })
        ));
        assert!(matches!(
            Header::from_bytes(&bytes[..1], None),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unclustered_flag() {
        let mut bytes = sample_header().to_bytes().unwrap();
        bytes[96] = 0;
        assert!(!Header::from_bytes(&bytes, None).unwrap().clustered);
    }

    #[test]
    fn test_zoom_range() {
        let header = sample_header();
        assert!(header.contains_zoom(0));
        assert!(header.contains_zoom(14));
        assert!(!header.contains_zoom(15));
        assert!(!header.is_legacy());
    }
}
