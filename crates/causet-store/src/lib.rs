//! Snapshot persistence for the causet engine.
//!
//! Snapshots are written in the compact `TKSN` binary format: a fixed
//! little-endian header followed by varint-packed entity records. The
//! [`PersistSink`] consumer plugs into the snapshot pipeline and writes
//! every sampled snapshot through a [`SnapshotStorage`] backend.
//!
//! # Modules
//!
//! - [`codec`] -- `TKSN` encoder and decoder
//! - [`varint`] -- LEB128 varints with zigzag mapping
//! - [`snapshot_store`] -- File and in-memory storage backends
//! - [`sink`] -- Pipeline consumer that encodes and persists
//! - [`error`] -- Codec and storage errors

pub mod codec;
pub mod error;
pub mod sink;
pub mod snapshot_store;
pub mod varint;

pub use codec::{FORMAT_VERSION, HEADER_LEN, Header, MAGIC, decode, encode};
pub use error::{CodecError, StoreError};
pub use sink::PersistSink;
pub use snapshot_store::{FileSnapshotStore, MemoryStore, SNAPSHOT_EXTENSION, SnapshotStorage};
