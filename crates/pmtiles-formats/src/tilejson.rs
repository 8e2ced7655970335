//! TileJSON 3.0.0 documents describing an archive

use crate::header::Header;
use serde_json::{Map, Value, json};

/// TileJSON version produced by [`tile_json`]
pub const TILEJSON_VERSION: &str = "3.0.0";

const METADATA_KEYS: [&str; 5] = ["vector_layers", "attribution", "description", "name", "version"];

/// Build a TileJSON document for an archive served under `base_url`
///
/// Bounds, center and zoom range come from the header; descriptive fields
/// are copied from the archive's JSON metadata when present.
pub fn tile_json(header: &Header, metadata: &Value, base_url: &str) -> Value {
    let base = base_url.trim_end_matches('/');
    let ext = match header.tile_type.extension() {
        "" => String::new(),
        ext => format!(".{ext}"),
    };

    let mut doc = Map::new();
    doc.insert("tilejson".to_string(), json!(TILEJSON_VERSION));
    doc.insert("scheme".to_string(), json!("xyz"));
    doc.insert("tiles".to_string(), json!([format!("{base}/{{z}}/{{x}}/{{y}}{ext}")]));

    for key in METADATA_KEYS {
        if let Some(value) = metadata.get(key).filter(|v| !v.is_null()) {
            doc.insert(key.to_string(), value.clone());
        }
    }

    doc.insert("bounds".to_string(), json!(header.bounds()));
    doc.insert("center".to_string(), json!(header.center()));
    doc.insert("minzoom".to_string(), json!(header.min_zoom));
    doc.insert("maxzoom".to_string(), json!(header.max_zoom));

    Value::Object(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::TileType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vector_archive() {
        let header = Header {
            tile_type: TileType::Mvt,
            min_zoom: 0,
            max_zoom: 14,
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 1.0,
            max_lat: 1.0,
            center_zoom: 0,
            ..Header::new()
        };
        let metadata = json!({
            "name": "test_fixture_1.pmtiles",
            "description": "test_fixture_1.pmtiles",
            "version": "2",
            "vector_layers": [{"id": "test_fixture_1pmtiles"}],
            "type": "overlay"
        });

        let doc = tile_json(&header, &metadata, "https://example.com/foo");
        assert_eq!(
            doc,
            json!({
                "tilejson": "3.0.0",
                "scheme": "xyz",
                "tiles": ["https://example.com/foo/{z}/{x}/{y}.mvt"],
                "vector_layers": [{"id": "test_fixture_1pmtiles"}],
                "description": "test_fixture_1.pmtiles",
                "name": "test_fixture_1.pmtiles",
                "version": "2",
                "bounds": [0.0, 0.0, 1.0, 1.0],
                "center": [0.0, 0.0, 0.0],
                "minzoom": 0,
                "maxzoom": 14
            })
        );
        assert!(doc.get("attribution").is_none());
    }

    #[test]
    fn test_unknown_tile_type_has_no_extension() {
        let doc = tile_json(&Header::new(), &Value::Null, "http://localhost/tiles/");
        assert_eq!(doc["tiles"][0], "http://localhost/tiles/{z}/{x}/{y}");
    }
}
