//! Error types for the snapshot persistence layer.
//!
//! [`CodecError`] covers the `TKSN` binary format in both directions;
//! [`StoreError`] wraps it together with the I/O failures of a storage
//! backend, carrying the path that failed.

use std::path::PathBuf;

/// Errors produced while encoding or decoding a `TKSN` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Fewer bytes than a full header.
    #[error("snapshot is {len} bytes, shorter than the {expected}-byte header")]
    ShortHeader {
        /// Bytes available.
        len: usize,
        /// Header size.
        expected: usize,
    },

    /// The file does not start with `TKSN`.
    #[error("bad magic {found:?}, expected \"TKSN\"")]
    BadMagic {
        /// The four bytes found.
        found: [u8; 4],
    },

    /// The format version is not one this reader understands.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found.
        found: u32,
    },

    /// Dimension count outside `1..=64`.
    #[error("invalid dimension count {dimensions}")]
    InvalidDimensions {
        /// The dimension count found or supplied.
        dimensions: u32,
    },

    /// A record vector does not match the snapshot's dimension count.
    #[error("entity {index}: {field} has {actual} components, snapshot has {expected} dimensions")]
    DimensionMismatch {
        /// Record index.
        index: usize,
        /// Which vector.
        field: &'static str,
        /// Snapshot dimension count.
        expected: usize,
        /// Components found.
        actual: usize,
    },

    /// The input ended inside a record.
    #[error("truncated record {index} at byte {offset}")]
    Truncated {
        /// Record index being read.
        index: u32,
        /// Byte offset where input ran out.
        offset: usize,
    },

    /// A varint ran past 10 bytes.
    #[error("varint at byte {offset} is longer than 10 bytes")]
    VarintTooLong {
        /// Byte offset of the varint.
        offset: usize,
    },

    /// A varint encodes a value wider than 64 bits.
    #[error("varint at byte {offset} overflows 64 bits")]
    VarintOverflow {
        /// Byte offset of the varint.
        offset: usize,
    },

    /// A multi-byte varint ends in a zero group.
    #[error("varint at byte {offset} is not minimally encoded")]
    VarintNonCanonical {
        /// Byte offset of the varint.
        offset: usize,
    },

    /// Bytes remain after the last declared record.
    #[error("{count} trailing bytes after the last record")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// A value does not fit the fixed-width field the format gives it.
    #[error("{field} value {value} does not fit the snapshot format")]
    ValueOutOfRange {
        /// Which field.
        field: &'static str,
        /// The offending value, rendered.
        value: String,
    },
}

/// Errors produced by a snapshot storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No snapshot is stored for the requested tick.
    #[error("no snapshot stored for tick {tick}")]
    NotFound {
        /// The requested tick.
        tick: u64,
    },
}

impl StoreError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
