//! Entities and their attributes.
//!
//! An entity's energy is never stored. It is derived on demand from
//! `(generation, birth_tick, tick)` by [`Entity::energy_at`], so total system
//! energy at any tick can be recomputed from entity metadata alone.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::scalar::Scalar;
use crate::vector::{Vector, VectorError};

/// Errors raised by entity-level invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// Energy was requested for a tick earlier than the entity's birth.
    #[error("energy of {entity_id} queried at tick {tick}, before birth tick {birth_tick}")]
    EnergyBeforeBirth {
        /// The entity that was queried.
        entity_id: EntityId,
        /// The tick that was requested.
        tick: Scalar,
        /// The entity's birth tick.
        birth_tick: Scalar,
    },

    /// Momentum and position disagree on the dimension count.
    #[error("entity geometry error: {0}")]
    Geometry(#[from] VectorError),
}

/// Outcome of evaluating an entity's movement rule for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Move to the given position.
    Move(Position),
    /// Stay put (no momentum, or not enough energy to pay its cost).
    Stay,
}

/// Location of an entity in the substrate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub Vector);

impl Position {
    /// The origin of a `dimensions`-dimensional substrate.
    pub fn origin(dimensions: usize) -> Self {
        Self(Vector::zero(dimensions))
    }

    /// Borrow the underlying vector.
    pub const fn vector(&self) -> &Vector {
        &self.0
    }
}

impl From<Vec<i64>> for Position {
    fn from(components: Vec<i64>) -> Self {
        Self(Vector::from(components))
    }
}

/// Momentum: a direction vector plus the energy cost of sustaining it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Momentum {
    /// Energy an entity must hold to move along `vector` this tick.
    pub cost: Scalar,
    /// Per-tick displacement.
    pub vector: Vector,
}

impl Momentum {
    /// Zero momentum with zero cost.
    pub fn at_rest(dimensions: usize) -> Self {
        Self {
            cost: Scalar::ZERO,
            vector: Vector::zero(dimensions),
        }
    }
}

/// Behavioural variant of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Moves and ages, nothing else.
    Simple,
    /// Additionally annihilates with any entity it overlaps.
    Colliding,
}

impl EntityKind {
    /// Whether this variant initiates annihilation on overlap.
    pub const fn collides(self) -> bool {
        matches!(self, Self::Colliding)
    }
}

/// A simulated entity owned by a substrate registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identity.
    pub id: EntityId,
    /// Behavioural variant.
    pub kind: EntityKind,
    /// Coupling/mass-like weight. Never negative.
    pub generation: Scalar,
    /// Current location.
    pub position: Position,
    /// Tick at which the entity was created.
    pub birth_tick: Scalar,
    /// Current momentum.
    pub momentum: Momentum,
}

impl Entity {
    /// Energy at `tick`: `generation × (tick − birth_tick)`.
    pub fn energy_at(&self, tick: &Scalar) -> Result<Scalar, EntityError> {
        if *tick < self.birth_tick {
            return Err(EntityError::EnergyBeforeBirth {
                entity_id: self.id,
                tick: tick.clone(),
                birth_tick: self.birth_tick.clone(),
            });
        }
        Ok(&self.generation * (tick - &self.birth_tick))
    }

    /// Evaluate the movement rule at `tick` without committing it.
    ///
    /// Both variants move the same way: by their momentum vector, provided
    /// their energy at `tick` covers the momentum cost.
    pub fn advance(&self, tick: &Scalar) -> Result<Step, EntityError> {
        let energy = self.energy_at(tick)?;
        if self.momentum.vector.is_zero() || energy < self.momentum.cost {
            return Ok(Step::Stay);
        }
        let next = self.position.0.try_add(&self.momentum.vector)?;
        Ok(Step::Move(Position(next)))
    }

    /// Age at `tick`, or `None` before birth.
    pub fn age_at(&self, tick: &Scalar) -> Option<Scalar> {
        (*tick >= self.birth_tick).then(|| tick - &self.birth_tick)
    }

    /// Value-copy of this entity as seen at `tick`.
    pub fn record_at(&self, tick: &Scalar) -> Result<EntityRecord, EntityError> {
        Ok(EntityRecord {
            position: self.position.clone(),
            energy: self.energy_at(tick)?,
            generation: self.generation.clone(),
            momentum: self.momentum.clone(),
            birth_tick: self.birth_tick.clone(),
        })
    }
}

/// Point-in-time projection of one entity, as carried by a snapshot.
///
/// Identity and variant are deliberately absent: a record holds exactly the
/// fields of the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Location at the snapshot tick.
    pub position: Position,
    /// Energy at the snapshot tick.
    pub energy: Scalar,
    /// Generation weight.
    pub generation: Scalar,
    /// Momentum at the snapshot tick.
    pub momentum: Momentum,
    /// Birth tick.
    pub birth_tick: Scalar,
}

impl EntityRecord {
    /// Whether `energy` matches the value derived from the record's metadata
    /// at `tick`.
    pub fn is_consistent_at(&self, tick: &Scalar) -> bool {
        *tick >= self.birth_tick && self.energy == &self.generation * (tick - &self.birth_tick)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entity(generation: i64, birth: i64) -> Entity {
        Entity {
            id: EntityId::new(),
            kind: EntityKind::Simple,
            generation: Scalar::from(generation),
            position: Position::origin(2),
            birth_tick: Scalar::from(birth),
            momentum: Momentum::at_rest(2),
        }
    }

    #[test]
    fn energy_is_age_proportional() {
        let e = entity(3, 10);
        assert_eq!(e.energy_at(&Scalar::from(10_i64)).unwrap(), Scalar::ZERO);
        assert_eq!(
            e.energy_at(&Scalar::from(14_i64)).unwrap(),
            Scalar::from(12_i64)
        );
    }

    #[test]
    fn energy_before_birth_is_rejected() {
        let e = entity(1, 5);
        let err = e.energy_at(&Scalar::from(4_i64)).unwrap_err();
        assert!(matches!(err, EntityError::EnergyBeforeBirth { .. }));
        assert_eq!(e.age_at(&Scalar::from(4_i64)), None);
    }

    #[test]
    fn record_is_consistent_with_metadata() {
        let e = entity(2, 1);
        let tick = Scalar::from(6_i64);
        let record = e.record_at(&tick).unwrap();
        assert_eq!(record.energy, Scalar::from(10_i64));
        assert!(record.is_consistent_at(&tick));
        assert!(!record.is_consistent_at(&Scalar::from(7_i64)));
    }

    #[test]
    fn advance_moves_by_momentum_when_affordable() {
        let mut e = entity(1, 0);
        e.momentum = Momentum {
            cost: Scalar::from(2_i64),
            vector: Vector::from(vec![1, -1]),
        };
        assert_eq!(e.advance(&Scalar::from(1_i64)).unwrap(), Step::Stay);
        assert_eq!(
            e.advance(&Scalar::from(2_i64)).unwrap(),
            Step::Move(Position::from(vec![1, -1]))
        );
    }

    #[test]
    fn advance_at_rest_stays() {
        let e = entity(5, 0);
        assert_eq!(e.advance(&Scalar::from(9_i64)).unwrap(), Step::Stay);
    }

    #[test]
    fn only_colliding_kind_collides() {
        assert!(EntityKind::Colliding.collides());
        assert!(!EntityKind::Simple.collides());
    }
}
