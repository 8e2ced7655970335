//! Archive fixtures and instrumented sources shared by the integration tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use pmtiles_formats::{Compression, Entry, HEADER_SIZE, Header, TileType, encode_directory, zxy_to_tile_id};
use pmtiles_reader::{MemorySource, RangeResponse, ReaderError, ReaderResult, Source};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Payload stored for `z/x/y` in every fixture
pub fn payload(z: u8, x: u32, y: u32) -> Vec<u8> {
    format!("tile {z}/{x}/{y}").into_bytes()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A serialized archive plus where its pieces ended up
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub header: Header,
    /// Absolute `(offset, length)` of every leaf directory
    pub leaves: Vec<(u64, u64)>,
}

/// Builds v3 archives laid out as header, root, metadata, leaves, tile data
pub struct ArchiveBuilder {
    tiles: Vec<(u8, u32, u32)>,
    metadata: String,
    leaf_size: Option<usize>,
    gzip: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            metadata: r#"{"name":"fixture","vector_layers":[{"id":"roads"}]}"#.to_string(),
            leaf_size: None,
            gzip: false,
        }
    }

    /// Every tile of zoom levels `0..=max_zoom`
    pub fn pyramid(mut self, max_zoom: u8) -> Self {
        for z in 0..=max_zoom {
            let dim = 1u32 << z;
            for x in 0..dim {
                for y in 0..dim {
                    self.tiles.push((z, x, y));
                }
            }
        }
        self
    }

    pub fn tile(mut self, z: u8, x: u32, y: u32) -> Self {
        self.tiles.push((z, x, y));
        self
    }

    pub fn metadata(mut self, json: &str) -> Self {
        self.metadata = json.to_string();
        self
    }

    /// Move entries into leaf directories of `size` entries each
    pub fn leaves(mut self, size: usize) -> Self {
        self.leaf_size = Some(size);
        self
    }

    /// Gzip directories, metadata and tiles
    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    pub fn build(self) -> Fixture {
        let compress = |data: &[u8]| if self.gzip { gzip(data) } else { data.to_vec() };

        let mut coords = self.tiles.clone();
        coords.sort_by_key(|&(z, x, y)| zxy_to_tile_id(z, x, y).unwrap());
        coords.dedup();

        let mut tile_data = Vec::new();
        let mut entries = Vec::new();
        for &(z, x, y) in &coords {
            let data = compress(&payload(z, x, y));
            entries.push(Entry {
                tile_id: zxy_to_tile_id(z, x, y).unwrap(),
                offset: tile_data.len() as u64,
                length: data.len() as u32,
                run_length: 1,
            });
            tile_data.extend_from_slice(&data);
        }

        let mut leaf_section = Vec::new();
        let mut leaf_ranges = Vec::new();
        let root_entries = match self.leaf_size {
            None => entries.clone(),
            Some(size) => entries
                .chunks(size)
                .map(|chunk| {
                    let encoded = compress(&encode_directory(chunk));
                    let entry = Entry {
                        tile_id: chunk[0].tile_id,
                        offset: leaf_section.len() as u64,
                        length: encoded.len() as u32,
                        run_length: 0,
                    };
                    leaf_ranges.push((leaf_section.len() as u64, encoded.len() as u64));
                    leaf_section.extend_from_slice(&encoded);
                    entry
                })
                .collect(),
        };

        let root = compress(&encode_directory(&root_entries));
        let metadata = compress(self.metadata.as_bytes());
        let compression = if self.gzip { Compression::Gzip } else { Compression::None };

        let root_offset = HEADER_SIZE as u64;
        let metadata_offset = root_offset + root.len() as u64;
        let leaf_offset = metadata_offset + metadata.len() as u64;
        let tile_data_offset = leaf_offset + leaf_section.len() as u64;
        let max_zoom = coords.iter().map(|c| c.0).max().unwrap_or(0);
        let min_zoom = coords.iter().map(|c| c.0).min().unwrap_or(0);

        let header = Header {
            root_directory_offset: root_offset,
            root_directory_length: root.len() as u64,
            metadata_offset,
            metadata_length: metadata.len() as u64,
            leaf_directory_offset: leaf_offset,
            leaf_directory_length: leaf_section.len() as u64,
            tile_data_offset,
            tile_data_length: tile_data.len() as u64,
            num_addressed_tiles: entries.len() as u64,
            num_tile_entries: entries.len() as u64,
            num_tile_contents: entries.len() as u64,
            internal_compression: compression,
            tile_compression: compression,
            tile_type: TileType::Mvt,
            min_zoom,
            max_zoom,
            ..Header::new()
        };

        let mut bytes = header.to_bytes().unwrap();
        bytes.extend_from_slice(&root);
        bytes.extend_from_slice(&metadata);
        bytes.extend_from_slice(&leaf_section);
        bytes.extend_from_slice(&tile_data);

        let leaves = leaf_ranges
            .into_iter()
            .map(|(offset, length)| (leaf_offset + offset, length))
            .collect();
        Fixture { bytes, header, leaves }
    }
}

/// Archive whose single tile `0/0/0` sits behind `levels - 1` nested leaf directories
pub fn leaf_chain(levels: usize) -> Vec<u8> {
    let tile = payload(0, 0, 0);
    let tile_dir = encode_directory(&[Entry {
        tile_id: 0,
        offset: 0,
        length: tile.len() as u32,
        run_length: 1,
    }]);

    // Build from the innermost leaf outwards; each new leaf points at the previous one
    let mut leaf_section = Vec::new();
    let mut innermost = tile_dir;
    for _ in 1..levels {
        let offset = leaf_section.len() as u64;
        leaf_section.extend_from_slice(&innermost);
        innermost = encode_directory(&[Entry {
            tile_id: 0,
            offset,
            length: innermost.len() as u32,
            run_length: 0,
        }]);
    }
    let root = innermost;

    let root_offset = HEADER_SIZE as u64;
    let leaf_offset = root_offset + root.len() as u64;
    let tile_data_offset = leaf_offset + leaf_section.len() as u64;
    let header = Header {
        root_directory_offset: root_offset,
        root_directory_length: root.len() as u64,
        metadata_offset: leaf_offset,
        metadata_length: 0,
        leaf_directory_offset: leaf_offset,
        leaf_directory_length: leaf_section.len() as u64,
        tile_data_offset,
        tile_data_length: tile.len() as u64,
        num_addressed_tiles: 1,
        num_tile_entries: 1,
        num_tile_contents: 1,
        tile_type: TileType::Png,
        ..Header::new()
    };

    let mut bytes = header.to_bytes().unwrap();
    bytes.extend_from_slice(&root);
    bytes.extend_from_slice(&leaf_section);
    bytes.extend_from_slice(&tile);
    bytes
}

/// Version 2 archive with a JSON metadata block and no entries
pub fn legacy_archive(json: &str) -> Vec<u8> {
    let mut bytes = b"PM".to_vec();
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&(json.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(json.as_bytes());
    bytes
}

/// Source that counts reads and holds reads at or past `gate_from` until opened
pub struct GatedSource {
    inner: MemorySource,
    gate_from: u64,
    gate: watch::Sender<bool>,
    calls: Mutex<HashMap<u64, usize>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl GatedSource {
    pub fn new(inner: MemorySource, gate_from: u64) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner,
            gate_from,
            gate,
            calls: Mutex::new(HashMap::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &MemorySource {
        &self.inner
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub fn close(&self) {
        self.gate.send_replace(false);
    }

    pub fn calls_at(&self, offset: u64) -> usize {
        self.calls.lock().get(&offset).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Tokens the source was handed, in call order
    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl Source for GatedSource {
    fn key(&self) -> String {
        self.inner.key()
    }

    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
        expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse> {
        *self.calls.lock().entry(offset).or_default() += 1;
        if let Some(token) = cancel {
            self.tokens.lock().push(token.clone());
        }

        if offset >= self.gate_from {
            let opened = gate_opened(self.gate.subscribe());
            match cancel {
                Some(token) => tokio::select! {
                    () = token.cancelled() => return Err(ReaderError::Cancelled),
                    () = opened => {}
                },
                None => opened.await,
            }
        }

        self.inner.get_bytes(offset, length, cancel, expected_etag).await
    }
}

async fn gate_opened(mut gate: watch::Receiver<bool>) {
    let _ = gate.wait_for(|open| *open).await;
}

/// Source reporting a new version tag on every read
pub struct ChurningSource {
    data: Bytes,
    reads: AtomicU64,
}

impl ChurningSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            reads: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for ChurningSource {
    fn key(&self) -> String {
        "churning".to_string()
    }

    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        _cancel: Option<&CancellationToken>,
        expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse> {
        let etag = format!("v{}", self.reads.fetch_add(1, Ordering::SeqCst));
        if let Some(expected) = expected_etag
            && expected != etag
        {
            return Err(ReaderError::EtagMismatch {
                expected: Some(expected.to_string()),
                actual: Some(etag),
            });
        }
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;
        Ok(RangeResponse::new(self.data.slice(start..end)).with_etag(Some(etag)))
    }
}

/// Poll `condition` until it holds, failing the test after a second
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
