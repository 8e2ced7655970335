//! Unsigned LEB128 varints used by directory encoding

use crate::error::{FormatError, FormatResult};

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Read one varint from `buf` starting at `*pos`, advancing `*pos` past it
pub fn read_varint(buf: &[u8], pos: &mut usize) -> FormatResult<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(*pos) else {
            return Err(FormatError::Truncated {
                needed: *pos + 1,
                actual: buf.len(),
            });
        };
        *pos += 1;

        let shift = 7 * i as u32;
        let bits = u64::from(byte & 0x7f);
        // the tenth byte only has room for the top bit of a u64
        if i == MAX_VARINT_LEN - 1 && bits > 1 {
            return Err(FormatError::VarintTooLong);
        }
        value |= bits << shift;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(FormatError::VarintTooLong)
}

/// Append the varint encoding of `value` to `out`
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
