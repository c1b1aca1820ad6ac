//! Durable storage for encoded snapshots, keyed by tick.
//!
//! [`SnapshotStorage`] is the collaborator the persistence consumer writes
//! through: it accepts `(tick, bytes)` and stores them durably. Two
//! backends are provided:
//!
//! - [`FileSnapshotStore`] -- one `tick-<20 digits>.tksn` file per
//!   snapshot, written to a temp file and renamed into place so a reader
//!   never sees a half-written snapshot
//! - [`MemoryStore`] -- an in-process map, for tests and dry runs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use causet_types::Snapshot;
use tracing::{debug, warn};

use crate::codec;
use crate::error::StoreError;

/// File extension of stored snapshots.
pub const SNAPSHOT_EXTENSION: &str = "tksn";

/// Durable sink for encoded snapshots.
pub trait SnapshotStorage: Send {
    /// Store `bytes` as the snapshot for `tick`, replacing any earlier one.
    fn persist(&mut self, tick: u64, bytes: &[u8]) -> Result<(), StoreError>;
}

// =========================================================================
// File Store
// =========================================================================

/// Snapshot store backed by a directory of `.tksn` files.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a snapshot directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// The directory snapshots are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding the snapshot for `tick`.
    pub fn path_for(&self, tick: u64) -> PathBuf {
        self.dir.join(file_name(tick))
    }

    fn temp_path_for(&self, tick: u64) -> PathBuf {
        self.dir.join(format!(".{}.tmp", file_name(tick)))
    }

    /// Read the raw bytes stored for `tick`.
    pub fn load(&self, tick: u64) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(tick);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound { tick }
            } else {
                StoreError::io(path, e)
            }
        })
    }

    /// Read and decode the snapshot stored for `tick`.
    pub fn load_snapshot(&self, tick: u64) -> Result<Snapshot, StoreError> {
        let bytes = self.load(tick)?;
        Ok(codec::decode(&bytes)?)
    }

    /// Ticks with a stored snapshot, ascending. Files that do not follow the
    /// naming scheme are ignored.
    pub fn list_ticks(&self) -> Result<Vec<u64>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut ticks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if let Some(tick) = entry.file_name().to_str().and_then(parse_file_name) {
                ticks.push(tick);
            }
        }
        ticks.sort_unstable();
        Ok(ticks)
    }
}

impl SnapshotStorage for FileSnapshotStore {
    fn persist(&mut self, tick: u64, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(tick);
        let tmp = self.temp_path_for(tick);
        if let Err(e) = fs::write(&tmp, bytes) {
            discard(&tmp);
            return Err(StoreError::io(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            discard(&tmp);
            return Err(StoreError::io(&path, e));
        }
        debug!(tick, bytes = bytes.len(), path = %path.display(), "snapshot persisted");
        Ok(())
    }
}

/// Best-effort removal of a temp file left by a failed write.
fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %tmp.display(), error = %e, "could not remove temp snapshot file");
    }
}

fn file_name(tick: u64) -> String {
    format!("tick-{tick:020}.{SNAPSHOT_EXTENSION}")
}

fn parse_file_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix("tick-")?
        .strip_suffix(SNAPSHOT_EXTENSION)?
        .strip_suffix('.')?;
    if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// =========================================================================
// Memory Store
// =========================================================================

/// In-memory snapshot store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: BTreeMap<u64, Vec<u8>>,
}

impl MemoryStore {
    /// An empty store.
    pub const fn new() -> Self {
        Self {
            snapshots: BTreeMap::new(),
        }
    }

    /// Bytes stored for `tick`.
    pub fn get(&self, tick: u64) -> Option<&[u8]> {
        self.snapshots.get(&tick).map(Vec::as_slice)
    }

    /// Decode the snapshot stored for `tick`.
    pub fn load_snapshot(&self, tick: u64) -> Result<Snapshot, StoreError> {
        let bytes = self.get(tick).ok_or(StoreError::NotFound { tick })?;
        Ok(codec::decode(bytes)?)
    }

    /// Stored ticks, ascending.
    pub fn ticks(&self) -> Vec<u64> {
        self.snapshots.keys().copied().collect()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStorage for MemoryStore {
    fn persist(&mut self, tick: u64, bytes: &[u8]) -> Result<(), StoreError> {
        self.snapshots.insert(tick, bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use causet_types::Scalar;

    use super::*;

    #[test]
    fn file_names_are_zero_padded_and_parse_back() {
        assert_eq!(file_name(42), "tick-00000000000000000042.tksn");
        assert_eq!(parse_file_name(&file_name(u64::MAX)), Some(u64::MAX));
        assert_eq!(parse_file_name("tick-42.tksn"), None);
        assert_eq!(parse_file_name(".tick-00000000000000000042.tksn.tmp"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
    }

    #[test]
    fn file_store_persists_loads_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path().join("snaps")).unwrap();

        let snap = Snapshot::new(Scalar::from(300_u32), 2, Vec::new());
        let bytes = codec::encode(&snap).unwrap();
        store.persist(300, &bytes).unwrap();
        store.persist(100, &bytes).unwrap();
        fs::write(store.dir().join("README"), b"not a snapshot").unwrap();

        assert_eq!(store.list_ticks().unwrap(), vec![100, 300]);
        assert_eq!(store.load(300).unwrap(), bytes);
        assert_eq!(store.load_snapshot(300).unwrap(), snap);
        assert!(store.path_for(300).exists());
    }

    #[test]
    fn file_store_overwrites_same_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        store.persist(5, b"first").unwrap();
        store.persist(5, b"second").unwrap();
        assert_eq!(store.load(5).unwrap(), b"second");
        assert_eq!(store.list_ticks().unwrap(), vec![5]);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        // A non-empty directory where the snapshot file should go.
        let blocker = store.path_for(7);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        assert!(matches!(store.persist(7, b"bytes"), Err(StoreError::Io { .. })));
        assert!(!store.temp_path_for(7).exists());
        assert!(blocker.is_dir());
    }

    #[test]
    fn missing_tick_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load(9),
            Err(StoreError::NotFound { tick: 9 })
        ));
    }

    #[test]
    fn corrupt_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::open(dir.path()).unwrap();
        store.persist(1, b"TKSNgarbage").unwrap();
        assert!(matches!(store.load_snapshot(1), Err(StoreError::Codec(_))));
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        let snap = Snapshot::new(Scalar::from(10_u32), 1, Vec::new());
        store.persist(10, &codec::encode(&snap).unwrap()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.ticks(), vec![10]);
        assert_eq!(store.load_snapshot(10).unwrap(), snap);
        assert!(matches!(
            store.load_snapshot(11),
            Err(StoreError::NotFound { tick: 11 })
        ));
    }
}
