//! Parsers and builders for the PMTiles tile archive format
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Coordinate conversion
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::float_cmp)] // Exact coordinate comparisons in tests
#![allow(clippy::needless_range_loop)] // Column decoding reads neighbours by index
//! A PMTiles archive is a single file holding a header, a root directory,
//! JSON metadata, optional leaf directories and tile payloads. Tiles are
//! addressed by a Hilbert curve id, and directories map id ranges to byte
//! ranges.
//!
//! This crate is pure and synchronous: it turns bytes into typed structures
//! and back. Fetching those bytes is left to `pmtiles-reader`.
//!
//! # Modules
//!
//! - **tile_id**: conversion between `(z, x, y)` and Hilbert tile ids
//! - **header**: the 127-byte v3 header
//! - **directory**: varint column encoding and tile lookup
//! - **legacy**: detection and header decoding of v1/v2 archives
//! - **compression**: compression and tile type tags
//! - **tilejson**: TileJSON documents built from header and metadata
//!
//! # Example
//!
//! ```
//! use pmtiles_formats::{Directory, Entry, encode_directory, zxy_to_tile_id};
//!
//! let id = zxy_to_tile_id(1, 1, 0).unwrap();
//! let bytes = encode_directory(&[Entry { tile_id: id, offset: 0, length: 42, run_length: 1 }]);
//! let dir = Directory::from_bytes(&bytes).unwrap();
//! assert_eq!(dir.find_tile(id).map(|e| e.length), Some(42));
//! ```

#![warn(missing_docs)]

pub mod compression;
pub mod directory;
pub mod error;
pub mod header;
pub mod legacy;
pub mod tile_id;
pub mod tilejson;
pub mod varint;

pub use compression::{Compression, TileType};
pub use directory::{Directory, Entry, encode_directory, find_tile};
pub use error::{FormatError, FormatResult};
pub use header::{HEADER_SIZE, Header};
pub use tile_id::{MAX_ZOOM, TileCoord, tile_id_to_zxy, zxy_to_tile_id};
pub use tilejson::tile_json;
