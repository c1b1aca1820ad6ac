//! Causal adjacency graph and the collapse policy that bounds it.
//!
//! Every tick the substrate records a relation between entities that share
//! or neighbour a position, and between a parent and its child at birth.
//! Left alone this structure grows without limit, so the scheduler
//! periodically calls [`CausalGraph::collapse`], which keeps only the
//! highest-ranked relations. Anything pruned is gone for good.
//!
//! # Ranking
//!
//! Relations are ranked by, in order:
//!
//! 1. `weight`, higher first (how many times the relation was observed)
//! 2. `last_tick`, more recent first
//! 3. the `(a, b)` key, lexicographically smaller first
//!
//! The last rule makes the order total, so a collapse is deterministic even
//! when weights and recency tie.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use causet_types::{EntityId, Scalar};

/// Unordered pair of entity IDs, stored with the smaller ID first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationKey {
    a: EntityId,
    b: EntityId,
}

impl RelationKey {
    /// Build a key for two distinct entities. Returns `None` for a
    /// self-relation.
    pub fn new(x: EntityId, y: EntityId) -> Option<Self> {
        match x.cmp(&y) {
            Ordering::Less => Some(Self { a: x, b: y }),
            Ordering::Greater => Some(Self { a: y, b: x }),
            Ordering::Equal => None,
        }
    }

    /// The smaller endpoint.
    pub const fn a(&self) -> EntityId {
        self.a
    }

    /// The larger endpoint.
    pub const fn b(&self) -> EntityId {
        self.b
    }

    /// Whether `id` is one of the endpoints.
    pub fn touches(&self, id: EntityId) -> bool {
        self.a == id || self.b == id
    }
}

/// Strength and recency of one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Number of ticks on which the relation was observed.
    pub weight: u64,
    /// Most recent tick on which it was observed.
    pub last_tick: Scalar,
}

/// Result of one collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseOutcome {
    /// Relations held before the collapse.
    pub before: usize,
    /// Relations kept.
    pub retained: usize,
    /// Relations permanently forgotten.
    pub pruned: usize,
}

/// Undirected, weighted causal adjacency structure.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    relations: BTreeMap<RelationKey, Relation>,
}

impl CausalGraph {
    /// An empty graph.
    pub const fn new() -> Self {
        Self {
            relations: BTreeMap::new(),
        }
    }

    /// Observe a relation between `x` and `y` at `tick`.
    ///
    /// A new relation starts at weight 1; an existing one is reinforced and
    /// its recency refreshed. Returns `true` if the relation was new.
    /// Self-relations are ignored.
    pub fn observe(&mut self, x: EntityId, y: EntityId, tick: &Scalar) -> bool {
        let Some(key) = RelationKey::new(x, y) else {
            return false;
        };
        match self.relations.get_mut(&key) {
            Some(rel) => {
                rel.weight = rel.weight.saturating_add(1);
                rel.last_tick.clone_from(tick);
                false
            }
            None => {
                self.relations.insert(
                    key,
                    Relation {
                        weight: 1,
                        last_tick: tick.clone(),
                    },
                );
                true
            }
        }
    }

    /// Look up the relation between two entities.
    pub fn get(&self, x: EntityId, y: EntityId) -> Option<&Relation> {
        RelationKey::new(x, y).and_then(|key| self.relations.get(&key))
    }

    /// Number of relations held.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Whether no relations are held.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Iterate relations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RelationKey, &Relation)> {
        self.relations.iter()
    }

    /// Keep at most `cap` relations, ranked as described in the module docs.
    pub fn collapse(&mut self, cap: usize) -> CollapseOutcome {
        let before = self.relations.len();
        if before <= cap {
            return CollapseOutcome {
                before,
                retained: before,
                pruned: 0,
            };
        }

        let mut ranked: Vec<(RelationKey, Relation)> =
            std::mem::take(&mut self.relations).into_iter().collect();
        ranked.sort_by(|(ka, ra), (kb, rb)| rank(ka, ra, kb, rb));
        ranked.truncate(cap);
        self.relations = ranked.into_iter().collect();

        let retained = self.relations.len();
        CollapseOutcome {
            before,
            retained,
            pruned: before.saturating_sub(retained),
        }
    }
}

/// Total order used by [`CausalGraph::collapse`]; `Less` means "keep first".
fn rank(ka: &RelationKey, ra: &Relation, kb: &RelationKey, rb: &Relation) -> Ordering {
    rb.weight
        .cmp(&ra.weight)
        .then_with(|| rb.last_tick.cmp(&ra.last_tick))
        .then_with(|| ka.cmp(kb))
}
