//! Immutable point-in-time projection of a substrate.

use serde::{Deserialize, Serialize};

use crate::entity::EntityRecord;
use crate::scalar::Scalar;

/// Snapshot of a substrate at one tick.
///
/// Records are value copies: mutating the live substrate afterwards cannot
/// affect an emitted snapshot. Records are kept in a canonical order
/// (ascending by record value) so two snapshots of the same state compare
/// equal regardless of registry iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick at which the snapshot was taken.
    pub tick: Scalar,
    /// Dimension count of the substrate.
    pub dimensions: u32,
    /// Every entity alive at `tick`.
    pub entities: Vec<EntityRecord>,
}

impl Snapshot {
    /// Build a snapshot, sorting records into canonical order.
    pub fn new(tick: Scalar, dimensions: u32, mut entities: Vec<EntityRecord>) -> Self {
        entities.sort();
        Self {
            tick,
            dimensions,
            entities,
        }
    }

    /// Number of entity records.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Sum of all recorded energies.
    pub fn total_energy(&self) -> Scalar {
        self.entities.iter().map(|r| &r.energy).sum()
    }

    /// Whether every record's energy matches its metadata at this tick.
    pub fn energies_consistent(&self) -> bool {
        self.entities.iter().all(|r| r.is_consistent_at(&self.tick))
    }
}
