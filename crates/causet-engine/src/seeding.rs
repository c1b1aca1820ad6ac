//! Initial population placement.
//!
//! Entities are placed uniformly at random in `-spread..=spread` on every
//! axis with a random momentum in `-max_speed..=max_speed`, using a
//! seeded [`StdRng`] so a configuration always produces the same
//! starting substrate.

use std::iter;

use causet_core::Substrate;
use causet_core::config::SimulationConfig;
use causet_types::{EntityKind, Momentum, Position, Scalar, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// Build the tick-0 substrate described by `config`.
pub fn seed_substrate(config: &SimulationConfig) -> Result<Substrate, EngineError> {
    let seed = &config.seed;
    if seed.spread < 0 {
        return Err(EngineError::Seeding {
            message: format!("seed.spread must be non-negative, got {}", seed.spread),
        });
    }
    if seed.max_speed < 0 {
        return Err(EngineError::Seeding {
            message: format!("seed.max_speed must be non-negative, got {}", seed.max_speed),
        });
    }

    let mut substrate = Substrate::new(&config.substrate)?;
    let dims = usize::try_from(substrate.dimensions()).map_err(|e| EngineError::Seeding {
        message: e.to_string(),
    })?;
    let mut rng = StdRng::seed_from_u64(seed.rng_seed);

    let kinds = iter::repeat_n(EntityKind::Simple, to_usize(seed.simple_count))
        .chain(iter::repeat_n(EntityKind::Colliding, to_usize(seed.colliding_count)));
    for kind in kinds {
        let position = random_vector(&mut rng, dims, seed.spread);
        let momentum = Momentum {
            cost: Scalar::from(seed.momentum_cost),
            vector: Vector::from(random_vector(&mut rng, dims, seed.max_speed)),
        };
        substrate.spawn(
            kind,
            Position::from(position),
            Scalar::from(seed.generation),
            momentum,
        )?;
    }

    tracing::info!(
        rng_seed = seed.rng_seed,
        simple = seed.simple_count,
        colliding = seed.colliding_count,
        dimensions = dims,
        "Seed population placed"
    );
    Ok(substrate)
}

fn random_vector(rng: &mut impl Rng, dims: usize, bound: i64) -> Vec<i64> {
    (0..dims).map(|_| rng.random_range(-bound..=bound)).collect()
}

fn to_usize(count: u32) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}
