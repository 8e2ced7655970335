//! Directory encoding and tile lookup
//!
//! A serialized directory is a column-oriented stream of varints:
//!
//! ```text
//! count
//! tile id deltas   (count values)
//! run lengths      (count values)
//! lengths          (count values)
//! offsets          (count values)
//! ```
//!
//! An offset of `0` on any entry but the first means "immediately after the
//! previous entry"; any other value `v` stores the absolute offset `v - 1`.
//! A run length of `0` marks a pointer to a leaf directory instead of tile
//! data.

use crate::error::{FormatError, FormatResult};
use crate::varint::{read_varint, write_varint};
use serde::{Deserialize, Serialize};

/// One row of a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// First tile id covered by this entry
    pub tile_id: u64,
    /// Byte offset, relative to the tile data or leaf directory section
    pub offset: u64,
    /// Byte length of the payload
    pub length: u32,
    /// Number of consecutive tile ids sharing the payload, `0` for leaf pointers
    pub run_length: u32,
}

impl Entry {
    /// Whether this entry points at a leaf directory
    pub const fn is_leaf(&self) -> bool {
        self.run_length == 0
    }

    /// Whether `tile_id` falls inside this entry's run
    pub fn covers(&self, tile_id: u64) -> bool {
        tile_id >= self.tile_id
            && (self.run_length == 0 || tile_id - self.tile_id < u64::from(self.run_length))
    }
}

/// A decoded directory, entries sorted by strictly increasing tile id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<Entry>,
}

impl Directory {
    /// Decode a directory from its (decompressed) bytes
    pub fn from_bytes(bytes: &[u8]) -> FormatResult<Self> {
        let mut pos = 0;
        let count = read_varint(bytes, &mut pos)?;
        if count == 0 {
            return Err(FormatError::EmptyDirectory);
        }
        // every entry needs at least four bytes; reject counts the input
        // cannot possibly hold before allocating
        let remaining = (bytes.len() - pos) as u64;
        if count > remaining / 4 {
            return Err(FormatError::Truncated {
                needed: pos.saturating_add((count as usize).saturating_mul(4)),
                actual: bytes.len(),
            });
        }
        let count = count as usize;

        let mut entries = vec![
            Entry {
                tile_id: 0,
                offset: 0,
                length: 0,
                run_length: 0,
            };
            count
        ];

        let mut last_id = 0u64;
        for (index, entry) in entries.iter_mut().enumerate() {
            let delta = read_varint(bytes, &mut pos)?;
            if index > 0 && delta == 0 {
                return Err(FormatError::UnsortedEntries { index });
            }
            last_id = last_id
                .checked_add(delta)
                .ok_or(FormatError::ValueOverflow {
                    field: "tile_id",
                    value: delta,
                })?;
            entry.tile_id = last_id;
        }

        for entry in &mut entries {
            entry.run_length = narrow(read_varint(bytes, &mut pos)?, "run_length")?;
        }

        for entry in &mut entries {
            entry.length = narrow(read_varint(bytes, &mut pos)?, "length")?;
        }

        for index in 0..count {
            let value = read_varint(bytes, &mut pos)?;
            entries[index].offset = match (value, index) {
                (0, 0) => return Err(FormatError::InvalidOffset { index }),
                (0, _) => {
                    let prev = entries[index - 1];
                    prev.offset
                        .checked_add(u64::from(prev.length))
                        .ok_or(FormatError::InvalidOffset { index })?
                }
                (v, _) => v - 1,
            };
        }

        Ok(Self { entries })
    }

    /// Encode as the uncompressed column stream
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_directory(&self.entries)
    }

    /// Entries in tile id order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry responsible for `tile_id`, see [`find_tile`]
    pub fn find_tile(&self, tile_id: u64) -> Option<&Entry> {
        find_tile(&self.entries, tile_id)
    }
}

fn narrow(value: u64, field: &'static str) -> FormatResult<u32> {
    u32::try_from(value).map_err(|_| FormatError::ValueOverflow { field, value })
}

/// Encode entries into the uncompressed column stream
pub fn encode_directory(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 8 + 1);
    write_varint(&mut out, entries.len() as u64);

    let mut last_id = 0;
    for entry in entries {
        write_varint(&mut out, entry.tile_id - last_id);
        last_id = entry.tile_id;
    }
    for entry in entries {
        write_varint(&mut out, u64::from(entry.run_length));
    }
    for entry in entries {
        write_varint(&mut out, u64::from(entry.length));
    }
    for (index, entry) in entries.iter().enumerate() {
        let contiguous = index > 0 && {
            let prev = &entries[index - 1];
            entry.offset == prev.offset + u64::from(prev.length)
        };
        write_varint(&mut out, if contiguous { 0 } else { entry.offset + 1 });
    }

    out
}

/// Find the entry responsible for `tile_id` in sorted `entries`
///
/// An exact match is returned as-is. Otherwise the closest preceding entry
/// is returned when it is a leaf pointer or its run covers `tile_id`.
pub fn find_tile(entries: &[Entry], tile_id: u64) -> Option<&Entry> {
    match entries.binary_search_by_key(&tile_id, |entry| entry.tile_id) {
        Ok(index) => Some(&entries[index]),
        Err(0) => None,
        Err(index) => {
            let candidate = &entries[index - 1];
            candidate.covers(tile_id).then_some(candidate)
        }
    }
}
