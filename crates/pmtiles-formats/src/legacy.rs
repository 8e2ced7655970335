//! Version 1 and 2 archives
//!
//! Legacy archives start with `PM` followed by a little-endian `u16`
//! version, a `u32` JSON metadata size and a `u16` root entry count. The
//! JSON metadata follows at offset 10, then the root directory made of
//! 17-byte entries. Only the header is decoded here; readers are expected
//! to report legacy tile lookups as unsupported.

use crate::compression::{Compression, TileType};
use crate::error::{FormatError, FormatResult};
use crate::header::Header;
use serde_json::Value;

/// Size of the fixed part of a legacy header
pub const LEGACY_HEADER_SIZE: usize = 10;

/// Size of one legacy directory entry
pub const LEGACY_ENTRY_SIZE: u64 = 17;

/// Legacy format version encoded in `bytes`, if any
pub fn detect_version(bytes: &[u8]) -> Option<u8> {
    let raw = bytes.get(2..4)?;
    match u16::from_le_bytes([raw[0], raw[1]]) {
        1 => Some(1),
        2 => Some(2),
        _ => None,
    }
}

/// Decode a legacy header into the common [`Header`] shape
///
/// Zoom range, bounds, center and tile compression come from the embedded
/// JSON metadata. When that JSON is missing from `bytes` or malformed the
/// defaults of [`Header::new`] are kept.
pub fn parse_header(bytes: &[u8], version: u8, etag: Option<String>) -> FormatResult<Header> {
    if bytes.len() < LEGACY_HEADER_SIZE {
        return Err(FormatError::Truncated {
            needed: LEGACY_HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let json_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let root_entries = u16::from_le_bytes([bytes[8], bytes[9]]);

    let mut header = Header {
        spec_version: version,
        root_directory_offset: LEGACY_HEADER_SIZE as u64 + u64::from(json_size),
        root_directory_length: u64::from(root_entries) * LEGACY_ENTRY_SIZE,
        metadata_offset: LEGACY_HEADER_SIZE as u64,
        metadata_length: u64::from(json_size),
        leaf_directory_offset: 0,
        tile_data_offset: 0,
        clustered: false,
        internal_compression: Compression::None,
        tile_compression: Compression::Unknown,
        tile_type: TileType::Mvt,
        etag,
        ..Header::new()
    };

    let json_end = LEGACY_HEADER_SIZE + json_size as usize;
    let metadata = bytes
        .get(LEGACY_HEADER_SIZE..json_end)
        .and_then(|raw| serde_json::from_slice::<Value>(raw).ok())
        .unwrap_or(Value::Null);
    apply_metadata(&mut header, &metadata);

    Ok(header)
}

fn apply_metadata(header: &mut Header, metadata: &Value) {
    if metadata.get("compression").and_then(Value::as_str) == Some("gzip") {
        header.tile_compression = Compression::Gzip;
    }
    if let Some(zoom) = metadata.get("minzoom").and_then(as_zoom) {
        header.min_zoom = zoom;
    }
    if let Some(zoom) = metadata.get("maxzoom").and_then(as_zoom) {
        header.max_zoom = zoom;
    }
    if let Some([west, south, east, north]) = metadata
        .get("bounds")
        .and_then(Value::as_str)
        .and_then(split_numbers::<4>)
    {
        header.min_lon = west;
        header.min_lat = south;
        header.max_lon = east;
        header.max_lat = north;
    }
    if let Some([lon, lat, zoom]) = metadata
        .get("center")
        .and_then(Value::as_str)
        .and_then(split_numbers::<3>)
    {
        header.center_lon = lon;
        header.center_lat = lat;
        header.center_zoom = zoom.clamp(0.0, f64::from(u8::MAX)) as u8;
    }
}

/// Zoom levels are stored as either numbers or numeric strings
fn as_zoom(value: &Value) -> Option<u8> {
    let zoom = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (0.0..=f64::from(u8::MAX))
        .contains(&zoom)
        .then_some(zoom as u8)
}

fn split_numbers<const N: usize>(raw: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut parts = raw.split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn legacy_bytes(version: u16, json: &str, root_entries: u16) -> Vec<u8> {
        let mut bytes = b"PM".to_vec();
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(&(json.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&root_entries.to_le_bytes());
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    #[test]
    fn test_detect_version() {
        assert_eq!(detect_version(&legacy_bytes(2, "{}", 0)), Some(2));
        assert_eq!(detect_version(&legacy_bytes(1, "{}", 0)), Some(1));
        assert_eq!(detect_version(b"PMTiles\x03"), None);
        assert_eq!(detect_version(b"PM"), None);
    }

    #[test]
    fn test_parse_metadata_fields() {
        let json = r#"{"minzoom":"2","maxzoom":9,"bounds":"-10,-20,30,40","center":"1.5,2.5,4","compression":"gzip"}"#;
        let bytes = legacy_bytes(2, json, 3);
        let header = Header::from_bytes(&bytes, Some("e1".to_string())).unwrap();

        assert_eq!(header.spec_version, 2);
        assert!(header.is_legacy());
        assert_eq!(header.metadata_offset, 10);
        assert_eq!(header.metadata_length, json.len() as u64);
        assert_eq!(header.root_directory_offset, 10 + json.len() as u64);
        assert_eq!(header.root_directory_length, 51);
        assert_eq!(header.min_zoom, 2);
        assert_eq!(header.max_zoom, 9);
        assert_eq!(header.bounds(), [-10.0, -20.0, 30.0, 40.0]);
        assert_eq!(header.center(), [1.5, 2.5, 4.0]);
        assert_eq!(header.tile_compression, Compression::Gzip);
        assert_eq!(header.internal_compression, Compression::None);
        assert_eq!(header.tile_type, TileType::Mvt);
        assert_eq!(header.etag.as_deref(), Some("e1"));
    }

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let mut bytes = legacy_bytes(2, r#"{"minzoom":3}"#, 1);
        // cut the JSON short, as a too-small initial read would
        bytes.truncate(14);
        let header = Header::from_bytes(&bytes, None).unwrap();
        assert_eq!(header.min_zoom, 0);
        assert_eq!(header.bounds(), [-180.0, -85.0, 180.0, 85.0]);
        assert_eq!(header.tile_compression, Compression::Unknown);
    }

    #[test]
    fn test_malformed_bounds_ignored() {
        let bytes = legacy_bytes(1, r#"{"bounds":"1,2,three,4"}"#, 0);
        let header = Header::from_bytes(&bytes, None).unwrap();
        assert_eq!(header.bounds(), [-180.0, -85.0, 180.0, 85.0]);
    }

    #[test]
    fn test_truncated_fixed_part() {
        let bytes = legacy_bytes(2, "{}", 0);
        assert!(matches!(
            parse_header(&bytes[..6], 2, None),
            Err(FormatError::Truncated { needed: 10, actual: 6 })
        ));
    }
}
