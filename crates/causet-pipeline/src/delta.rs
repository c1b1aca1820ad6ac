//! Backward difference between two snapshots seen by one consumer.
//!
//! A consumer compares the snapshot it just received at tick `n` with the
//! last one it observed, at tick `n - v`. `v` is the consumer's own pace, so
//! two consumers fed by the same producer may compute different deltas for
//! the same tick.
//!
//! Records are compared on their stored metadata (position, generation,
//! momentum, birth tick). Energy is left out: it is derived from that
//! metadata and the tick, so it changes every tick for every entity and
//! carries no information of its own. An entity that moved shows up as one
//! removal plus one addition. Snapshots may hold identical records, so the
//! comparison is a multiset difference.
//!
//! The delta covers entities only. A snapshot is exactly the persisted
//! projection (tick, dimension count, entity records) and its records carry
//! no identity, so the causal relations, which are keyed by entity ID and
//! live in the substrate's graph, are not part of it.

use std::collections::BTreeMap;

use causet_types::{EntityRecord, Momentum, Position, Scalar, Snapshot};
use serde::Serialize;

/// Changes between a consumer's previous snapshot and its current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDelta {
    /// Tick of the previous snapshot, or `None` on first observation.
    pub from_tick: Option<Scalar>,
    /// Tick of the current snapshot.
    pub to_tick: Scalar,
    /// Records present now but not before.
    pub added: Vec<EntityRecord>,
    /// Records present before but not now.
    pub removed: Vec<EntityRecord>,
}

type RecordKey<'a> = (&'a Position, &'a Scalar, &'a Momentum, &'a Scalar);

fn key(record: &EntityRecord) -> RecordKey<'_> {
    (
        &record.position,
        &record.generation,
        &record.momentum,
        &record.birth_tick,
    )
}

fn counts(snapshot: &Snapshot) -> BTreeMap<RecordKey<'_>, (usize, &EntityRecord)> {
    let mut map: BTreeMap<RecordKey<'_>, (usize, &EntityRecord)> = BTreeMap::new();
    for record in &snapshot.entities {
        map.entry(key(record))
            .and_modify(|(n, _)| *n = n.saturating_add(1))
            .or_insert((1, record));
    }
    map
}

/// Records whose key occurs more often in `a` than in `b`, once per extra
/// occurrence.
fn surplus<'a>(
    a: &BTreeMap<RecordKey<'a>, (usize, &'a EntityRecord)>,
    b: &BTreeMap<RecordKey<'a>, (usize, &'a EntityRecord)>,
) -> Vec<EntityRecord> {
    let mut out = Vec::new();
    for (k, (n, record)) in a {
        let other = b.get(k).map_or(0, |(m, _)| *m);
        for _ in 0..n.saturating_sub(other) {
            out.push((*record).clone());
        }
    }
    out
}

impl SnapshotDelta {
    /// Compute the delta from `previous` (if any) to `current`.
    ///
    /// With no previous snapshot every current record counts as added.
    pub fn between(previous: Option<&Snapshot>, current: &Snapshot) -> Self {
        let Some(previous) = previous else {
            return Self {
                from_tick: None,
                to_tick: current.tick.clone(),
                added: current.entities.clone(),
                removed: Vec::new(),
            };
        };

        let before = counts(previous);
        let after = counts(current);
        Self {
            from_tick: Some(previous.tick.clone()),
            to_tick: current.tick.clone(),
            added: surplus(&after, &before),
            removed: surplus(&before, &after),
        }
    }

    /// Rebuild the current snapshot from `previous` and this delta.
    ///
    /// Retained records get their energy re-derived at `to_tick`. Returns
    /// `None` if `previous` is not the snapshot this delta starts from: the
    /// tick differs or a removed record is missing.
    pub fn apply(&self, previous: &Snapshot) -> Option<Snapshot> {
        if self.from_tick.as_ref() != Some(&previous.tick) {
            return None;
        }
        let mut records = previous.entities.clone();
        for gone in &self.removed {
            let index = records.iter().position(|r| key(r) == key(gone))?;
            records.swap_remove(index);
        }
        for record in &mut records {
            if self.to_tick < record.birth_tick {
                return None;
            }
            record.energy = &record.generation * (&self.to_tick - &record.birth_tick);
        }
        records.extend(self.added.iter().cloned());
        Some(Snapshot::new(self.to_tick.clone(), previous.dimensions, records))
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Ticks spanned by this delta (`to - from`), or `None` on first
    /// observation.
    pub fn span(&self) -> Option<Scalar> {
        self.from_tick.as_ref().map(|from| &self.to_tick - from)
    }
}
