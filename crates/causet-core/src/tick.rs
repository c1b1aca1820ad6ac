//! Tick cycle: the four-phase loop body that advances a substrate.
//!
//! Each tick runs through these phases, in order:
//!
//! 1. **Compute** -- advance the clock and evaluate every entity's movement
//!    rule for the new tick without committing anything.
//!
//! 2. **Grow** -- commit the planned moves, widen the substrate bounds if
//!    entities approach the boundary, and apply the birth rule.
//!
//! 3. **Apply-Law** -- record causal relations between co-located and
//!    neighbouring entities, then annihilate overlapping colliding entities
//!    and charge their energy to the loss counter.
//!
//! 4. **Collapse** -- on every `collapse_period`-th tick, prune the causal
//!    graph down to `max_relations`.
//!
//! A phase failure aborts the tick with a [`TickError`]; the scheduler
//! treats that as fatal and stops. So does a failing post-tick callback.

use causet_types::{EntityError, Scalar};
use tracing::debug;

use crate::config::{BirthConfig, SimulationConfig};
use crate::substrate::{Substrate, SubstrateError};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The compute phase hit a model invariant violation.
    #[error("compute phase failed: {source}")]
    Compute {
        /// The underlying substrate error.
        source: SubstrateError,
    },

    /// Committing moves or births failed.
    #[error("grow phase failed: {source}")]
    Grow {
        /// The underlying substrate error.
        source: SubstrateError,
    },

    /// Collision resolution failed.
    #[error("apply-law phase failed: {source}")]
    ApplyLaw {
        /// The underlying substrate error.
        source: SubstrateError,
    },

    /// The post-tick callback could not observe the substrate (snapshot
    /// assembly hit an entity invariant violation).
    #[error("post-tick observation failed: {source}")]
    Observe {
        /// The underlying entity error.
        source: EntityError,
    },
}

/// Per-tick rules, extracted from configuration once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickRules {
    /// Collapse every this many ticks (0 = never).
    pub collapse_period: u64,
    /// Relation cap enforced by a collapse.
    pub max_relations: usize,
    /// Birth rule.
    pub birth: BirthConfig,
}

impl TickRules {
    /// Extract the per-tick rules from the full configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            collapse_period: config.schedule.collapse_period,
            max_relations: config.schedule.max_relations,
            birth: config.birth.clone(),
        }
    }
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that was executed.
    pub tick: Scalar,
    /// Entities in the registry at the end of the tick.
    pub alive: usize,
    /// Entities moved in the grow phase.
    pub moved: usize,
    /// Entities born this tick.
    pub births: usize,
    /// Pairs annihilated this tick.
    pub annihilations: usize,
    /// Energy converted to loss this tick.
    pub energy_lost: Scalar,
    /// Cumulative energy loss after this tick.
    pub total_energy_loss: Scalar,
    /// Relations held after the tick.
    pub relations: usize,
    /// Relations pruned by collapse this tick.
    pub pruned: usize,
    /// Whether the collapse phase ran.
    pub collapsed: bool,
    /// Substrate extent after the grow phase.
    pub extent: Scalar,
}

/// Execute one full tick against `substrate`.
pub fn run_tick(substrate: &mut Substrate, rules: &TickRules) -> Result<TickSummary, TickError> {
    // --- Phase 1: Compute ---
    let tick = substrate.advance_clock();
    let planned = substrate
        .plan_moves()
        .map_err(|source| TickError::Compute { source })?;

    // --- Phase 2: Grow ---
    let moved = substrate
        .commit_moves(planned)
        .map_err(|source| TickError::Grow { source })?;
    let growth_steps = substrate.grow_bounds();
    let born = substrate
        .apply_births(&rules.birth)
        .map_err(|source| TickError::Grow { source })?;
    // Children may land on the boundary.
    let growth_steps = growth_steps.saturating_add(substrate.grow_bounds());

    // --- Phase 3: Apply-Law ---
    let law = substrate
        .apply_law()
        .map_err(|source| TickError::ApplyLaw { source })?;

    // --- Phase 4: Collapse ---
    let collapse = substrate
        .clock()
        .is_period_boundary(rules.collapse_period)
        .then(|| substrate.collapse(rules.max_relations));

    let summary = TickSummary {
        tick,
        alive: substrate.len(),
        moved,
        births: born.len(),
        annihilations: law.annihilated.len(),
        energy_lost: law.energy_lost,
        total_energy_loss: substrate.energy_loss().clone(),
        relations: substrate.graph().len(),
        pruned: collapse.map_or(0, |c| c.pruned),
        collapsed: collapse.is_some(),
        extent: substrate.extent().clone(),
    };

    debug!(
        tick = %summary.tick,
        alive = summary.alive,
        moved = summary.moved,
        births = summary.births,
        annihilations = summary.annihilations,
        growth_steps,
        relations = summary.relations,
        pruned = summary.pruned,
        "tick complete"
    );

    Ok(summary)
}
