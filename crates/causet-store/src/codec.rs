//! The `TKSN` binary snapshot format.
//!
//! # Layout
//!
//! A 32-byte header, all integers little-endian:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "TKSN"
//!      4     4  format version (1)
//!      8     8  tick
//!     16     4  entity count
//!     20     4  dimension count (1..=64)
//!     24     8  reserved, written as zero, ignored on read
//! ```
//!
//! followed by one record per entity:
//!
//! ```text
//! D x zigzag varint   position coordinates
//!     varint          energy
//!     varint          generation
//!     varint          momentum cost
//! D x zigzag varint   momentum vector components
//!     varint          birth tick
//! ```
//!
//! [`decode`] is the exact inverse of [`encode`]. Records are written and
//! read in snapshot order. Any deviation from the layout fails the read;
//! there is no partial recovery.

use causet_types::{EntityRecord, MAX_DIMENSIONS, Momentum, Position, Scalar, Snapshot, Vector};

use crate::error::CodecError;
use crate::varint::{self, VarintFault};

/// File magic.
pub const MAGIC: [u8; 4] = *b"TKSN";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_LEN: usize = 32;

/// Fixed-size header of a `TKSN` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u32,
    /// Snapshot tick.
    pub tick: u64,
    /// Number of records that follow.
    pub entity_count: u32,
    /// Components per position and momentum vector.
    pub dimensions: u32,
}

impl Header {
    /// Append the fixed 32-byte layout to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.entity_count.to_le_bytes());
        out.extend_from_slice(&self.dimensions.to_le_bytes());
        out.extend_from_slice(&[0_u8; 8]);
    }

    /// Parse and validate the header at the front of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let short = || CodecError::ShortHeader {
            len: bytes.len(),
            expected: HEADER_LEN,
        };
        let header = bytes.get(..HEADER_LEN).ok_or_else(short)?;

        let magic: [u8; 4] = take(header, 0).ok_or_else(short)?;
        if magic != MAGIC {
            return Err(CodecError::BadMagic { found: magic });
        }
        let version = u32::from_le_bytes(take(header, 4).ok_or_else(short)?);
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion { found: version });
        }
        let tick = u64::from_le_bytes(take(header, 8).ok_or_else(short)?);
        let entity_count = u32::from_le_bytes(take(header, 16).ok_or_else(short)?);
        let dimensions = u32::from_le_bytes(take(header, 20).ok_or_else(short)?);
        if dimensions == 0 || dimensions > MAX_DIMENSIONS {
            return Err(CodecError::InvalidDimensions { dimensions });
        }

        Ok(Self {
            version,
            tick,
            entity_count,
            dimensions,
        })
    }
}

fn take<const N: usize>(bytes: &[u8], at: usize) -> Option<[u8; N]> {
    bytes
        .get(at..at.checked_add(N)?)
        .and_then(|s| s.try_into().ok())
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn to_u64(field: &'static str, v: &Scalar) -> Result<u64, CodecError> {
    v.to_u64().ok_or_else(|| CodecError::ValueOutOfRange {
        field,
        value: v.to_string(),
    })
}

fn to_i64(field: &'static str, v: &Scalar) -> Result<i64, CodecError> {
    v.to_i64().ok_or_else(|| CodecError::ValueOutOfRange {
        field,
        value: v.to_string(),
    })
}

fn write_vector(
    out: &mut Vec<u8>,
    index: usize,
    field: &'static str,
    v: &Vector,
    dims: usize,
) -> Result<(), CodecError> {
    if v.dimensions() != dims {
        return Err(CodecError::DimensionMismatch {
            index,
            field,
            expected: dims,
            actual: v.dimensions(),
        });
    }
    for c in v.components() {
        varint::write_i64(out, to_i64(field, c)?);
    }
    Ok(())
}

/// Serialize a snapshot.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    if snapshot.dimensions == 0 || snapshot.dimensions > MAX_DIMENSIONS {
        return Err(CodecError::InvalidDimensions {
            dimensions: snapshot.dimensions,
        });
    }
    let entity_count =
        u32::try_from(snapshot.entities.len()).map_err(|_overflow| CodecError::ValueOutOfRange {
            field: "entity count",
            value: snapshot.entities.len().to_string(),
        })?;
    let header = Header {
        version: FORMAT_VERSION,
        tick: to_u64("tick", &snapshot.tick)?,
        entity_count,
        dimensions: snapshot.dimensions,
    };
    let dims = usize::try_from(snapshot.dimensions).unwrap_or(usize::MAX);

    // Rough guess: one byte per varint.
    let per_record = dims.saturating_mul(2).saturating_add(4);
    let mut out = Vec::with_capacity(
        HEADER_LEN.saturating_add(per_record.saturating_mul(snapshot.entities.len())),
    );
    header.write_to(&mut out);

    for (index, record) in snapshot.entities.iter().enumerate() {
        write_vector(&mut out, index, "position", record.position.vector(), dims)?;
        varint::write_u64(&mut out, to_u64("energy", &record.energy)?);
        varint::write_u64(&mut out, to_u64("generation", &record.generation)?);
        varint::write_u64(&mut out, to_u64("momentum cost", &record.momentum.cost)?);
        write_vector(&mut out, index, "momentum", &record.momentum.vector, dims)?;
        varint::write_u64(&mut out, to_u64("birth tick", &record.birth_tick)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

struct RecordReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    index: u32,
}

impl RecordReader<'_> {
    fn rest(&self) -> &[u8] {
        self.bytes.get(self.offset..).unwrap_or(&[])
    }

    fn fault(&self, fault: VarintFault) -> CodecError {
        fault.at(self.index, self.offset)
    }

    fn unsigned(&mut self) -> Result<Scalar, CodecError> {
        let (v, n) = varint::read_u64(self.rest()).map_err(|f| self.fault(f))?;
        self.offset = self.offset.saturating_add(n);
        Ok(Scalar::from(v))
    }

    fn signed(&mut self) -> Result<Scalar, CodecError> {
        let (v, n) = varint::read_i64(self.rest()).map_err(|f| self.fault(f))?;
        self.offset = self.offset.saturating_add(n);
        Ok(Scalar::from(v))
    }

    fn vector(&mut self, dims: u32) -> Result<Vector, CodecError> {
        let components = (0..dims)
            .map(|_| self.signed())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Vector::from_components(components))
    }

    fn record(&mut self, dims: u32) -> Result<EntityRecord, CodecError> {
        let position = Position(self.vector(dims)?);
        let energy = self.unsigned()?;
        let generation = self.unsigned()?;
        let cost = self.unsigned()?;
        let vector = self.vector(dims)?;
        let birth_tick = self.unsigned()?;
        Ok(EntityRecord {
            position,
            energy,
            generation,
            momentum: Momentum { cost, vector },
            birth_tick,
        })
    }
}

/// Parse a snapshot, validating the whole input.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let header = Header::parse(bytes)?;
    let mut reader = RecordReader {
        bytes,
        offset: HEADER_LEN,
        index: 0,
    };

    // Every record takes at least 2·D + 4 bytes; don't trust the declared
    // count for the allocation.
    let count = usize::try_from(header.entity_count).unwrap_or(usize::MAX);
    let mut entities = Vec::with_capacity(count.min(reader.rest().len()));
    for index in 0..header.entity_count {
        reader.index = index;
        entities.push(reader.record(header.dimensions)?);
    }

    let trailing = reader.rest().len();
    if trailing != 0 {
        return Err(CodecError::TrailingBytes { count: trailing });
    }

    // Struct literal, not `Snapshot::new`: file order is preserved as-is.
    Ok(Snapshot {
        tick: Scalar::from(header.tick),
        dimensions: header.dimensions,
        entities,
    })
}
