//! LEB128-style varints and zigzag mapping.
//!
//! Each byte carries 7 data bits, least-significant group first; the high
//! bit is set on every byte except the last. A `u64` needs at most 10 bytes,
//! and the 10th byte may only carry the single remaining bit. Encodings are
//! canonical: a multi-byte varint may not end in a zero byte, so every value
//! has exactly one accepted encoding.
//!
//! Signed values are zigzag-mapped first (`(v << 1) ^ (v >> 63)`), so small
//! magnitudes of either sign stay short: 0, -1, 1, -2 encode as 0, 1, 2, 3.

use crate::error::CodecError;

/// Longest valid encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Map a signed value onto the unsigned range, interleaving signs.
#[allow(clippy::cast_sign_loss)]
pub const fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[allow(clippy::cast_possible_wrap)]
pub const fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Append the varint encoding of `v` to `out`.
pub fn write_u64(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        #[allow(clippy::cast_possible_truncation)]
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    #[allow(clippy::cast_possible_truncation)]
    out.push(v as u8);
}

/// Append the zigzag varint encoding of `v` to `out`.
pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    write_u64(out, zigzag(v));
}

/// Number of bytes [`write_u64`] emits for `v`.
pub const fn encoded_len(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Why a varint could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintFault {
    /// Input ended before the final byte.
    Eof,
    /// More than [`MAX_VARINT_LEN`] bytes.
    TooLong,
    /// Value wider than 64 bits.
    Overflow,
    /// Padded with a trailing zero group.
    NonCanonical,
}

/// Decode one varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_u64(bytes: &[u8]) -> Result<(u64, usize), VarintFault> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(VarintFault::TooLong);
        }
        let group = u64::from(byte & 0x7f);
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(VarintFault::Overflow);
        }
        value |= group << (7 * i);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(VarintFault::NonCanonical);
            }
            return Ok((value, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(VarintFault::TooLong)
    } else {
        Err(VarintFault::Eof)
    }
}

/// Decode one zigzag varint from the front of `bytes`.
pub fn read_i64(bytes: &[u8]) -> Result<(i64, usize), VarintFault> {
    read_u64(bytes).map(|(v, n)| (unzigzag(v), n))
}

impl VarintFault {
    /// Convert into a [`CodecError`] located at `offset` within record
    /// `index`.
    pub const fn at(self, index: u32, offset: usize) -> CodecError {
        match self {
            Self::Eof => CodecError::Truncated { index, offset },
            Self::TooLong => CodecError::VarintTooLong { offset },
            Self::Overflow => CodecError::VarintOverflow { offset },
            Self::NonCanonical => CodecError::VarintNonCanonical { offset },
        }
    }
}
