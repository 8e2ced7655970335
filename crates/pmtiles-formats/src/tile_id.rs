//! Hilbert curve tile ids
//!
//! Every tile of every zoom level maps to a single integer. Zoom levels are
//! laid out back to back: zoom `z` starts at `(4^z - 1) / 3`, and inside a
//! level tiles are ordered along a Hilbert curve so that spatially close
//! tiles get close ids.

use crate::error::{FormatError, FormatResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest zoom level addressable by a tile id
pub const MAX_ZOOM: u8 = 26;

/// A tile address in the XYZ scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,
    /// Column, `0..2^z`
    pub x: u32,
    /// Row, `0..2^z`, counted from the north
    pub y: u32,
}

impl TileCoord {
    /// Create a coordinate without validating it
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile id of this coordinate
    pub fn tile_id(&self) -> FormatResult<u64> {
        zxy_to_tile_id(self.z, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl TryFrom<u64> for TileCoord {
    type Error = FormatError;

    fn try_from(tile_id: u64) -> FormatResult<Self> {
        tile_id_to_zxy(tile_id)
    }
}

/// First tile id of zoom level `z`
fn level_start(z: u8) -> u64 {
    ((1u64 << (2 * u32::from(z))) - 1) / 3
}

/// Convert a tile coordinate to its Hilbert tile id
pub fn zxy_to_tile_id(z: u8, x: u32, y: u32) -> FormatResult<u64> {
    if z > MAX_ZOOM {
        return Err(FormatError::ZoomOutOfRange(z));
    }
    let n = 1u64 << z;
    let (mut tx, mut ty) = (u64::from(x), u64::from(y));
    if tx >= n || ty >= n {
        return Err(FormatError::CoordinateOutOfRange { z, x, y });
    }

    let mut d = 0u64;
    let mut s = n >> 1;
    while s > 0 {
        let rx = u64::from(tx & s != 0);
        let ry = u64::from(ty & s != 0);
        d += s * s * ((3 * rx) ^ ry);
        tx &= s - 1;
        ty &= s - 1;
        (tx, ty) = rotate(s, tx, ty, rx, ry);
        s >>= 1;
    }

    Ok(level_start(z) + d)
}

/// Convert a Hilbert tile id back to its coordinate
pub fn tile_id_to_zxy(tile_id: u64) -> FormatResult<TileCoord> {
    // zoom z covers ids [(4^z - 1) / 3, (4^(z+1) - 1) / 3), so 3 * id + 1
    // lies in [4^z, 4^(z+1))
    let scaled = tile_id
        .checked_mul(3)
        .and_then(|v| v.checked_add(1))
        .ok_or(FormatError::TileIdOutOfRange(tile_id))?;
    let z = (63 - scaled.leading_zeros()) / 2;
    let z = u8::try_from(z).map_err(|_| FormatError::TileIdOutOfRange(tile_id))?;
    if z > MAX_ZOOM {
        return Err(FormatError::TileIdOutOfRange(tile_id));
    }

    let n = 1u64 << z;
    let mut t = tile_id - level_start(z);
    let (mut x, mut y) = (0u64, 0u64);
    let mut s = 1u64;
    while s < n {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        (x, y) = rotate(s, x, y, rx, ry);
        x += s * rx;
        y += s * ry;
        t /= 4;
        s <<= 1;
    }

    Ok(TileCoord::new(z, x as u32, y as u32))
}

/// Quadrant rotation; `x` and `y` must be below `n`
const fn rotate(n: u64, x: u64, y: u64, rx: u64, ry: u64) -> (u64, u64) {
    if ry != 0 {
        return (x, y);
    }
    if rx == 1 { (n - 1 - y, n - 1 - x) } else { (y, x) }
}
