//! The substrate: spatial registry of entities advanced one tick at a time.
//!
//! The substrate is the sole owner of entity lifetime. It holds the tick
//! clock, the registry (by ID, plus a position index for adjacency queries),
//! the symmetric growth bounds, the causal graph, and the cumulative
//! energy-loss counter. Registry size grows only through [`Substrate::spawn`]
//! and births, and shrinks only through annihilation.
//!
//! The per-phase primitives here are driven in order by
//! [`run_tick`](crate::tick::run_tick).

use std::collections::{BTreeMap, BTreeSet};

use causet_types::{
    Entity, EntityError, EntityId, EntityKind, MAX_DIMENSIONS, Momentum, Position, Scalar,
    Snapshot, Step, Vector,
};
use tracing::debug;

use crate::clock::TickClock;
use crate::config::{BirthConfig, SubstrateConfig};
use crate::relations::{CausalGraph, CollapseOutcome};

/// Errors raised by substrate operations.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    /// Dimension count outside `1..=MAX_DIMENSIONS`.
    #[error("invalid dimension count {dimensions} (allowed 1..={MAX_DIMENSIONS})")]
    InvalidDimensions {
        /// The rejected dimension count.
        dimensions: u32,
    },

    /// A vector handed to the substrate has the wrong number of components.
    #[error("{what} has {actual} dimensions, substrate has {expected}")]
    DimensionMismatch {
        /// Which argument was wrong.
        what: &'static str,
        /// Substrate dimension count.
        expected: usize,
        /// Dimension count supplied.
        actual: usize,
    },

    /// A weight that must be non-negative was negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeWeight {
        /// Which field.
        field: &'static str,
        /// The rejected value.
        value: Scalar,
    },

    /// An entity-level invariant was violated.
    #[error("entity invariant violated: {0}")]
    Entity(#[from] EntityError),
}

/// Movement proposed in the compute phase, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// The entity that moves.
    pub entity_id: EntityId,
    /// Where it moves to.
    pub to: Position,
}

/// What the grow phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowthReport {
    /// Entities whose position changed.
    pub moved: usize,
    /// Growth steps applied to the extent.
    pub growth_steps: u64,
    /// Entities born this tick.
    pub births: Vec<EntityId>,
}

/// What the apply-law phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionReport {
    /// Annihilated pairs, in resolution order.
    pub annihilated: Vec<(EntityId, EntityId)>,
    /// Energy converted into loss this tick.
    pub energy_lost: Scalar,
    /// Relations first observed this tick.
    pub new_relations: usize,
}

/// Spatial container of entities.
#[derive(Debug, Clone)]
pub struct Substrate {
    dimensions: u32,
    clock: TickClock,
    entities: BTreeMap<EntityId, Entity>,
    occupancy: BTreeMap<Position, BTreeSet<EntityId>>,
    extent: Scalar,
    growth_margin: Scalar,
    growth_step: Scalar,
    energy_loss: Scalar,
    graph: CausalGraph,
    /// Start positions of the entities moved by the last `commit_moves`.
    departures: BTreeMap<EntityId, Position>,
}

impl Substrate {
    /// Create an empty substrate at tick 0.
    pub fn new(config: &SubstrateConfig) -> Result<Self, SubstrateError> {
        let dimensions = config.dimensions;
        if dimensions == 0 || dimensions > MAX_DIMENSIONS {
            return Err(SubstrateError::InvalidDimensions { dimensions });
        }
        Ok(Self {
            dimensions,
            clock: TickClock::new(),
            entities: BTreeMap::new(),
            occupancy: BTreeMap::new(),
            extent: Scalar::from(config.initial_extent),
            growth_margin: Scalar::from(config.growth_margin),
            growth_step: Scalar::from(config.growth_step.max(1)),
            energy_loss: Scalar::ZERO,
            graph: CausalGraph::new(),
            departures: BTreeMap::new(),
        })
    }

    /// Create an empty substrate with default geometry and the given
    /// dimension count.
    pub fn with_dimensions(dimensions: u32) -> Result<Self, SubstrateError> {
        Self::new(&SubstrateConfig {
            dimensions,
            ..SubstrateConfig::default()
        })
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Dimension count.
    pub const fn dimensions(&self) -> u32 {
        self.dimensions
    }

    /// Current tick.
    pub const fn tick(&self) -> &Scalar {
        self.clock.tick()
    }

    /// The tick clock.
    pub const fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Number of entities in the registry.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Iterate entities in ID order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities occupying `position`, in ID order.
    pub fn entities_at<'a>(&'a self, position: &Position) -> impl Iterator<Item = &'a Entity> + 'a {
        self.occupancy
            .get(position)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.entities.get(id))
    }

    /// Cumulative energy converted by annihilation.
    pub const fn energy_loss(&self) -> &Scalar {
        &self.energy_loss
    }

    /// Current half-width of the bounded region.
    pub const fn extent(&self) -> &Scalar {
        &self.extent
    }

    /// The causal graph.
    pub const fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    /// Total energy of all live entities at the current tick.
    pub fn total_energy(&self) -> Result<Scalar, EntityError> {
        let tick = self.clock.tick();
        self.entities
            .values()
            .try_fold(Scalar::ZERO, |acc, e| Ok(acc + e.energy_at(tick)?))
    }

    /// Assemble an immutable snapshot of the current state.
    pub fn snapshot(&self) -> Result<Snapshot, EntityError> {
        let tick = self.clock.tick();
        let records = self
            .entities
            .values()
            .map(|e| e.record_at(tick))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Snapshot::new(tick.clone(), self.dimensions, records))
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Create an entity born at the current tick.
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        position: Position,
        generation: Scalar,
        momentum: Momentum,
    ) -> Result<EntityId, SubstrateError> {
        self.check_dimensions("position", position.vector())?;
        self.check_dimensions("momentum", &momentum.vector)?;
        if generation.is_negative() {
            return Err(SubstrateError::NegativeWeight {
                field: "generation",
                value: generation,
            });
        }
        if momentum.cost.is_negative() {
            return Err(SubstrateError::NegativeWeight {
                field: "momentum cost",
                value: momentum.cost,
            });
        }

        let entity = Entity {
            id: EntityId::new(),
            kind,
            generation,
            position,
            birth_tick: self.clock.tick().clone(),
            momentum,
        };
        let id = entity.id;
        self.insert(entity);
        Ok(id)
    }

    fn insert(&mut self, entity: Entity) {
        self.occupancy
            .entry(entity.position.clone())
            .or_default()
            .insert(entity.id);
        self.entities.insert(entity.id, entity);
    }

    fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.unindex(id, &entity.position);
        Some(entity)
    }

    fn unindex(&mut self, id: EntityId, position: &Position) {
        if let Some(ids) = self.occupancy.get_mut(position) {
            ids.remove(&id);
            if ids.is_empty() {
                self.occupancy.remove(position);
            }
        }
    }

    fn check_dimensions(&self, what: &'static str, v: &Vector) -> Result<(), SubstrateError> {
        let expected = usize::try_from(self.dimensions).unwrap_or(usize::MAX);
        if v.dimensions() == expected {
            Ok(())
        } else {
            Err(SubstrateError::DimensionMismatch {
                what,
                expected,
                actual: v.dimensions(),
            })
        }
    }

    // ---------------------------------------------------------------------
    // Phase primitives
    // ---------------------------------------------------------------------

    /// Advance the clock by one tick and return the new tick.
    pub fn advance_clock(&mut self) -> Scalar {
        self.clock.advance().clone()
    }

    /// Compute: evaluate every entity's movement rule at the current tick.
    pub fn plan_moves(&self) -> Result<Vec<PlannedMove>, SubstrateError> {
        let tick = self.clock.tick();
        let mut moves = Vec::new();
        for entity in self.entities.values() {
            if let Step::Move(to) = entity.advance(tick)? {
                moves.push(PlannedMove {
                    entity_id: entity.id,
                    to,
                });
            }
        }
        Ok(moves)
    }

    /// Grow, part one: commit planned moves. Returns how many entities moved.
    pub fn commit_moves(&mut self, moves: Vec<PlannedMove>) -> Result<usize, SubstrateError> {
        self.departures.clear();
        let mut moved = 0_usize;
        for PlannedMove { entity_id, to } in moves {
            self.check_dimensions("planned position", to.vector())?;
            let Some(entity) = self.entities.get_mut(&entity_id) else {
                continue;
            };
            let from = std::mem::replace(&mut entity.position, to.clone());
            self.unindex(entity_id, &from);
            self.occupancy.entry(to).or_default().insert(entity_id);
            self.departures.insert(entity_id, from);
            moved = moved.saturating_add(1);
        }
        Ok(moved)
    }

    /// Grow, part two: widen the bounds while any entity is within the
    /// margin of the boundary. Returns the number of growth steps applied.
    pub fn grow_bounds(&mut self) -> u64 {
        let Some(reach) = self
            .occupancy
            .keys()
            .map(|p| p.vector().chebyshev_norm())
            .max()
        else {
            return 0;
        };

        let needed = &reach + &self.growth_margin;
        if needed < self.extent {
            return 0;
        }
        let deficit = &needed - &self.extent;
        let steps = deficit
            .checked_div(&self.growth_step)
            .map_or_else(Scalar::one, |q| q + Scalar::one());
        self.extent = &self.extent + &(&steps * &self.growth_step);
        debug!(tick = %self.clock.tick(), extent = %self.extent, "substrate bounds grew");
        steps.to_u64().unwrap_or(u64::MAX)
    }

    /// Grow, part three: apply the birth rule.
    ///
    /// Every entity whose age is a positive multiple of `rule.period` spawns
    /// a child of the same kind and generation, one cell away along axis
    /// `tick mod D`, at rest. A `max_population` of 0 means no cap.
    pub fn apply_births(&mut self, rule: &BirthConfig) -> Result<Vec<EntityId>, SubstrateError> {
        if rule.period == 0 {
            return Ok(Vec::new());
        }
        let tick = self.clock.tick().clone();
        let period = Scalar::from(rule.period);
        let dims = Scalar::from(self.dimensions);
        let axis = tick
            .checked_rem(&dims)
            .and_then(|a| a.to_u64())
            .and_then(|a| usize::try_from(a).ok())
            .unwrap_or(0);

        let parents: Vec<(EntityId, EntityKind, Scalar, Position)> = self
            .entities
            .values()
            .filter(|e| {
                e.age_at(&tick)
                    .is_some_and(|age| !age.is_zero() && age.is_multiple_of(&period))
            })
            .map(|e| (e.id, e.kind, e.generation.clone(), e.position.clone()))
            .collect();

        let dimensions = usize::try_from(self.dimensions).unwrap_or(usize::MAX);
        let mut born = Vec::new();
        for (parent, kind, generation, position) in parents {
            if rule.max_population != 0 && self.entities.len() >= rule.max_population {
                break;
            }
            let Some(offset) = position.vector().offset_axis(axis, &Scalar::one()) else {
                continue;
            };
            let child = self.spawn(kind, Position(offset), generation, Momentum::at_rest(dimensions))?;
            self.graph.observe(parent, child, &tick);
            born.push(child);
        }
        Ok(born)
    }

    /// Apply-law, part one: observe relations between entities that share a
    /// position or occupy axis-neighbouring positions. Returns the number of
    /// relations seen for the first time.
    pub fn record_relations(&mut self) -> usize {
        let tick = self.clock.tick().clone();
        let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();
        for (position, ids) in &self.occupancy {
            let here: Vec<EntityId> = ids.iter().copied().collect();
            for (i, x) in here.iter().enumerate() {
                for y in here.iter().skip(i.saturating_add(1)) {
                    pairs.push((*x, *y));
                }
            }
            for neighbor in position.vector().axis_neighbors() {
                let Some(theirs) = self.occupancy.get(&Position(neighbor)) else {
                    continue;
                };
                for x in &here {
                    // Each neighbouring pair is seen from both sides; keep one.
                    pairs.extend(theirs.iter().filter(|y| x < *y).map(|y| (*x, *y)));
                }
            }
        }

        let mut fresh = 0_usize;
        for (x, y) in pairs {
            if self.graph.observe(x, y, &tick) {
                fresh = fresh.saturating_add(1);
            }
        }
        fresh
    }

    /// Apply-law, part two: annihilate overlapping entities.
    ///
    /// Two kinds of overlap are resolved, in this order:
    ///
    /// 1. **Crossings** -- two entities whose straight paths over the last
    ///    committed move meet strictly inside the tick (swapping cells,
    ///    passing through each other, or a mover passing through a resting
    ///    entity). Candidate pairs are taken in key order; a pair needs at
    ///    least one colliding member and two still-unpaired entities.
    /// 2. **Coincidence** -- within each occupied position, entities are
    ///    taken in ID order; each colliding entity that is still unpaired
    ///    pairs with the next unpaired entity of either kind.
    ///
    /// Both members of a pair are removed and their energies at the current
    /// tick are added to the loss counter. Departures are consumed, so a
    /// second call in the same tick sees only coincidence.
    pub fn resolve_collisions(&mut self) -> Result<CollisionReport, SubstrateError> {
        let tick = self.clock.tick().clone();
        let departures = std::mem::take(&mut self.departures);
        let mut taken: BTreeSet<EntityId> = BTreeSet::new();
        let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();

        for (x, y) in self.crossings(&departures) {
            if taken.contains(&x) || taken.contains(&y) {
                continue;
            }
            let collides = [x, y]
                .iter()
                .any(|id| self.entities.get(id).is_some_and(|e| e.kind.collides()));
            if collides {
                taken.insert(x);
                taken.insert(y);
                pairs.push((x, y));
            }
        }

        for ids in self.occupancy.values() {
            let group: Vec<(EntityId, bool)> = ids
                .iter()
                .filter(|id| !taken.contains(id))
                .filter_map(|id| self.entities.get(id).map(|e| (*id, e.kind.collides())))
                .collect();
            if group.len() < 2 {
                continue;
            }
            let mut paired = vec![false; group.len()];
            for (i, (initiator, collides)) in group.iter().enumerate() {
                let already = paired.get(i).copied().unwrap_or(true);
                if !*collides || already {
                    continue;
                }
                let partner = group
                    .iter()
                    .enumerate()
                    .find(|(j, _)| *j != i && !paired.get(*j).copied().unwrap_or(true));
                if let Some((j, (other, _))) = partner {
                    if let Some(slot) = paired.get_mut(i) {
                        *slot = true;
                    }
                    if let Some(slot) = paired.get_mut(j) {
                        *slot = true;
                    }
                    pairs.push((*initiator, *other));
                }
            }
        }

        let mut report = CollisionReport::default();
        for (x, y) in pairs {
            let ex = self.remove(x);
            let ey = self.remove(y);
            for e in ex.iter().chain(ey.iter()) {
                report.energy_lost = &report.energy_lost + &e.energy_at(&tick)?;
            }
            debug!(tick = %tick, a = %x, b = %y, "entities annihilated");
            report.annihilated.push((x, y));
        }
        self.energy_loss = &self.energy_loss + &report.energy_lost;
        Ok(report)
    }

    /// Pairs of entities whose paths over the last committed move meet
    /// strictly between the start and the end of the tick, in key order.
    /// At least one member of each pair moved.
    fn crossings(&self, departures: &BTreeMap<EntityId, Position>) -> Vec<(EntityId, EntityId)> {
        let mut found: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();
        for (mover, from) in departures {
            let Some(entity) = self.entities.get(mover) else {
                continue;
            };
            for other in self.entities.values() {
                if other.id == *mover || (departures.contains_key(&other.id) && other.id < *mover) {
                    continue;
                }
                let other_from = departures.get(&other.id).unwrap_or(&other.position);
                if paths_meet(from, &entity.position, other_from, &other.position) {
                    found.insert(if *mover < other.id {
                        (*mover, other.id)
                    } else {
                        (other.id, *mover)
                    });
                }
            }
        }
        found.into_iter().collect()
    }

    /// Apply-law: record relations, then annihilate overlapping entities.
    pub fn apply_law(&mut self) -> Result<CollisionReport, SubstrateError> {
        let new_relations = self.record_relations();
        let mut report = self.resolve_collisions()?;
        report.new_relations = new_relations;
        Ok(report)
    }

    /// Collapse: prune the causal graph down to `cap` relations.
    pub fn collapse(&mut self, cap: usize) -> CollapseOutcome {
        self.graph.collapse(cap)
    }
}

/// Whether `a` moving `a0 -> a1` and `b` moving `b0 -> b1` in straight
/// lines over one tick occupy the same point at some `0 < t < 1`.
///
/// With `d = b0 - a0` and `w = (a1 - a0) - (b1 - b0)` the paths meet at `t`
/// exactly when `d = t * w`, so `d` must be a positive multiple of `w` with
/// every component shorter than `w`'s.
fn paths_meet(a0: &Position, a1: &Position, b0: &Position, b1: &Position) -> bool {
    let (Ok(d), Ok(va), Ok(vb)) = (
        b0.vector().try_sub(a0.vector()),
        a1.vector().try_sub(a0.vector()),
        b1.vector().try_sub(b0.vector()),
    ) else {
        return false;
    };
    let Ok(w) = va.try_sub(&vb) else {
        return false;
    };
    let Some((dk, wk)) = d
        .components()
        .iter()
        .zip(w.components())
        .find(|(_, wk)| !wk.is_zero())
    else {
        return false;
    };
    // 0 < dk / wk < 1
    if dk.is_zero() || dk.is_negative() != wk.is_negative() || dk.abs() >= wk.abs() {
        return false;
    }
    d.components()
        .iter()
        .zip(w.components())
        .all(|(di, wi)| di * wk == dk * wi)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::tick::TickRules;

    fn substrate(dims: u32) -> Substrate {
        Substrate::with_dimensions(dims).unwrap()
    }

    fn spawn_at(s: &mut Substrate, kind: EntityKind, pos: Vec<i64>, generation: i64) -> EntityId {
        let dims = pos.len();
        s.spawn(kind, Position::from(pos), Scalar::from(generation), Momentum::at_rest(dims))
            .unwrap()
    }

    #[test]
    fn rejects_bad_dimension_counts() {
        assert!(matches!(
            Substrate::with_dimensions(0),
            Err(SubstrateError::InvalidDimensions { dimensions: 0 })
        ));
        assert!(Substrate::with_dimensions(MAX_DIMENSIONS + 1).is_err());
        assert!(Substrate::with_dimensions(MAX_DIMENSIONS).is_ok());
    }

    #[test]
    fn spawn_validates_geometry_and_weights() {
        let mut s = substrate(2);
        let wrong = s.spawn(
            EntityKind::Simple,
            Position::from(vec![0, 0, 0]),
            Scalar::one(),
            Momentum::at_rest(2),
        );
        assert!(matches!(wrong, Err(SubstrateError::DimensionMismatch { .. })));

        let negative = s.spawn(
            EntityKind::Simple,
            Position::origin(2),
            Scalar::from(-1_i64),
            Momentum::at_rest(2),
        );
        assert!(matches!(negative, Err(SubstrateError::NegativeWeight { .. })));
        assert!(s.is_empty());
    }

    #[test]
    fn spawn_stamps_current_tick() {
        let mut s = substrate(1);
        s.advance_clock();
        s.advance_clock();
        let id = spawn_at(&mut s, EntityKind::Simple, vec![0], 1);
        assert_eq!(s.get(id).unwrap().birth_tick, Scalar::from(2_u32));
    }

    #[test]
    fn colliding_pair_annihilates_and_counts_energy() {
        let mut s = substrate(2);
        let a = spawn_at(&mut s, EntityKind::Colliding, vec![0, 0], 2);
        let b = spawn_at(&mut s, EntityKind::Colliding, vec![0, 0], 3);
        for _ in 0..4 {
            s.advance_clock();
        }
        let expected = s.get(a).unwrap().energy_at(s.tick()).unwrap()
            + s.get(b).unwrap().energy_at(s.tick()).unwrap();

        let report = s.apply_law().unwrap();
        assert_eq!(report.annihilated.len(), 1);
        assert_eq!(report.energy_lost, expected);
        assert_eq!(*s.energy_loss(), Scalar::from(20_u32));
        assert!(s.is_empty());
        assert!(s.entities_at(&Position::origin(2)).next().is_none());
    }

    #[test]
    fn simple_entities_never_collide() {
        let mut s = substrate(1);
        spawn_at(&mut s, EntityKind::Simple, vec![3], 1);
        spawn_at(&mut s, EntityKind::Simple, vec![3], 1);
        s.advance_clock();
        let report = s.apply_law().unwrap();
        assert!(report.annihilated.is_empty());
        assert_eq!(s.len(), 2);
        assert_eq!(*s.energy_loss(), Scalar::ZERO);
    }

    #[test]
    fn colliding_takes_a_simple_partner() {
        let mut s = substrate(1);
        spawn_at(&mut s, EntityKind::Simple, vec![0], 1);
        spawn_at(&mut s, EntityKind::Colliding, vec![0], 1);
        spawn_at(&mut s, EntityKind::Simple, vec![0], 1);
        let report = s.resolve_collisions().unwrap();
        assert_eq!(report.annihilated.len(), 1);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn lone_colliding_entity_survives() {
        let mut s = substrate(1);
        spawn_at(&mut s, EntityKind::Colliding, vec![0], 1);
        spawn_at(&mut s, EntityKind::Colliding, vec![5], 1);
        let report = s.resolve_collisions().unwrap();
        assert!(report.annihilated.is_empty());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn moves_follow_momentum() {
        let mut s = substrate(2);
        let id = s
            .spawn(
                EntityKind::Simple,
                Position::origin(2),
                Scalar::one(),
                Momentum {
                    cost: Scalar::ZERO,
                    vector: Vector::from(vec![2, -1]),
                },
            )
            .unwrap();
        s.advance_clock();
        let moves = s.plan_moves().unwrap();
        assert_eq!(moves.len(), 1);
        // Not committed yet.
        assert_eq!(s.get(id).unwrap().position, Position::origin(2));
        assert_eq!(s.commit_moves(moves).unwrap(), 1);
        assert_eq!(s.get(id).unwrap().position, Position::from(vec![2, -1]));
        assert_eq!(s.entities_at(&Position::from(vec![2, -1])).count(), 1);
        assert_eq!(s.entities_at(&Position::origin(2)).count(), 0);
    }

    #[test]
    fn bounds_grow_near_the_edge() {
        let mut s = Substrate::new(&SubstrateConfig {
            dimensions: 1,
            initial_extent: 10,
            growth_margin: 2,
            growth_step: 5,
        })
        .unwrap();
        spawn_at(&mut s, EntityKind::Simple, vec![7], 1);
        assert_eq!(s.grow_bounds(), 0);
        spawn_at(&mut s, EntityKind::Simple, vec![-9], 1);
        assert_eq!(s.grow_bounds(), 1);
        assert_eq!(*s.extent(), Scalar::from(15_u32));
        spawn_at(&mut s, EntityKind::Simple, vec![30], 1);
        assert_eq!(s.grow_bounds(), 4);
        assert_eq!(*s.extent(), Scalar::from(35_u32));
    }

    #[test]
    fn relations_between_shared_and_adjacent_positions() {
        let mut s = substrate(2);
        let a = spawn_at(&mut s, EntityKind::Simple, vec![0, 0], 1);
        let b = spawn_at(&mut s, EntityKind::Simple, vec![0, 0], 1);
        let c = spawn_at(&mut s, EntityKind::Simple, vec![0, 1], 1);
        let d = spawn_at(&mut s, EntityKind::Simple, vec![5, 5], 1);
        let fresh = s.record_relations();
        assert_eq!(fresh, 3);
        assert!(s.graph().get(a, b).is_some());
        assert!(s.graph().get(a, c).is_some());
        assert!(s.graph().get(b, c).is_some());
        assert!(s.graph().get(a, d).is_none());

        assert_eq!(s.record_relations(), 0);
        assert_eq!(s.graph().get(a, b).unwrap().weight, 2);
    }

    #[test]
    fn births_follow_period_and_cap() {
        let mut s = substrate(2);
        let parent = spawn_at(&mut s, EntityKind::Simple, vec![0, 0], 1);
        let rule = BirthConfig {
            period: 3,
            max_population: 2,
        };
        s.advance_clock();
        assert!(s.apply_births(&rule).unwrap().is_empty());
        s.advance_clock();
        s.advance_clock();
        let born = s.apply_births(&rule).unwrap();
        assert_eq!(born.len(), 1);
        let child = s.get(born[0]).unwrap();
        // tick 3 mod 2 dimensions = axis 1
        assert_eq!(child.position, Position::from(vec![0, 1]));
        assert_eq!(child.birth_tick, Scalar::from(3_u32));
        assert!(s.graph().get(parent, born[0]).is_some());

        for _ in 0..3 {
            s.advance_clock();
        }
        assert!(s.apply_births(&rule).unwrap().is_empty(), "population cap reached");
    }

    #[test]
    fn snapshot_is_a_value_copy() {
        let mut s = substrate(1);
        let id = spawn_at(&mut s, EntityKind::Colliding, vec![0], 1);
        s.advance_clock();
        let snap = s.snapshot().unwrap();
        assert_eq!(snap.entity_count(), 1);
        assert_eq!(snap.entities[0].energy, Scalar::one());

        spawn_at(&mut s, EntityKind::Colliding, vec![0], 1);
        s.resolve_collisions().unwrap();
        assert!(s.get(id).is_none());
        assert_eq!(snap.entity_count(), 1);
    }

    fn spawn_moving(s: &mut Substrate, kind: EntityKind, pos: Vec<i64>, velocity: Vec<i64>) -> EntityId {
        s.spawn(
            kind,
            Position::from(pos),
            Scalar::one(),
            Momentum {
                cost: Scalar::ZERO,
                vector: Vector::from(velocity),
            },
        )
        .unwrap()
    }

    #[test]
    fn head_on_swap_annihilates() {
        let mut s = substrate(1);
        spawn_moving(&mut s, EntityKind::Colliding, vec![0], vec![1]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![1], vec![-1]);

        let summary = crate::tick::run_tick(&mut s, &TickRules::default()).unwrap();

        assert_eq!(summary.annihilations, 1);
        assert!(s.is_empty());
        // Both were born at tick 0 with generation 1.
        assert_eq!(*s.energy_loss(), Scalar::from(2_u32));
    }

    #[test]
    fn passing_through_annihilates() {
        let mut s = substrate(2);
        // Crosses [0, 2] mid-tick on its way to [4, 2]; the other entity
        // moves straight down through the same point.
        spawn_moving(&mut s, EntityKind::Colliding, vec![0, 2], vec![4, 0]);
        spawn_moving(&mut s, EntityKind::Simple, vec![2, 4], vec![0, -4]);
        s.advance_clock();
        let moves = s.plan_moves().unwrap();
        s.commit_moves(moves).unwrap();

        let report = s.resolve_collisions().unwrap();
        assert_eq!(report.annihilated.len(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn mover_passing_a_resting_entity_annihilates() {
        let mut s = substrate(1);
        spawn_moving(&mut s, EntityKind::Colliding, vec![0], vec![3]);
        spawn_at(&mut s, EntityKind::Simple, vec![1], 1);
        s.advance_clock();
        let moves = s.plan_moves().unwrap();
        s.commit_moves(moves).unwrap();

        assert_eq!(s.resolve_collisions().unwrap().annihilated.len(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn crossing_simple_entities_survive() {
        let mut s = substrate(1);
        spawn_moving(&mut s, EntityKind::Simple, vec![0], vec![1]);
        spawn_moving(&mut s, EntityKind::Simple, vec![1], vec![-1]);
        crate::tick::run_tick(&mut s, &TickRules::default()).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn parallel_and_diverging_paths_do_not_meet() {
        let mut s = substrate(2);
        spawn_moving(&mut s, EntityKind::Colliding, vec![0, 0], vec![1, 1]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![0, 1], vec![1, 1]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![5, 5], vec![1, 0]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![4, 5], vec![-1, 0]);
        s.advance_clock();
        let moves = s.plan_moves().unwrap();
        s.commit_moves(moves).unwrap();

        assert!(s.resolve_collisions().unwrap().annihilated.is_empty());
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn crossing_then_coincidence_each_pair_once() {
        let mut s = substrate(1);
        // a and b swap; c lands on the cell a ends in.
        spawn_moving(&mut s, EntityKind::Colliding, vec![0], vec![1]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![1], vec![-1]);
        spawn_moving(&mut s, EntityKind::Colliding, vec![3], vec![-2]);
        s.advance_clock();
        let moves = s.plan_moves().unwrap();
        s.commit_moves(moves).unwrap();

        let report = s.resolve_collisions().unwrap();
        // c ends on a's cell, but a is already taken by the swap.
        assert_eq!(report.annihilated.len(), 1);
        assert_eq!(s.len(), 1);
        // Departures are consumed by the first resolution.
        assert!(s.resolve_collisions().unwrap().annihilated.is_empty());
    }

    #[test]
    fn paths_meet_geometry() {
        let p = |v: Vec<i64>| Position::from(v);
        // Swap.
        assert!(paths_meet(&p(vec![0]), &p(vec![1]), &p(vec![1]), &p(vec![0])));
        // Meeting exactly at the end is coincidence, not a crossing.
        assert!(!paths_meet(&p(vec![0]), &p(vec![2]), &p(vec![4]), &p(vec![2])));
        // Starting together is not new.
        assert!(!paths_meet(&p(vec![0]), &p(vec![1]), &p(vec![0]), &p(vec![-1])));
        // Both at rest.
        assert!(!paths_meet(&p(vec![0]), &p(vec![0]), &p(vec![1]), &p(vec![1])));
        // Skew lines in 2-D that share no point.
        assert!(!paths_meet(
            &p(vec![0, 0]),
            &p(vec![2, 2]),
            &p(vec![0, 3]),
            &p(vec![2, 4])
        ));
    }
}
