//! Shared type definitions for the causet substrate.
//!
//! This crate is the leaf of the workspace: every other crate speaks in
//! these types.
//!
//! # Modules
//!
//! - [`scalar`] -- Arbitrary-precision [`Scalar`] for ticks and energy
//! - [`vector`] -- N-dimensional [`Vector`] of scalars
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`entity`] -- Entity attributes, variants, and derived energy
//! - [`snapshot`] -- Immutable point-in-time [`Snapshot`]

pub mod entity;
pub mod ids;
pub mod scalar;
pub mod snapshot;
pub mod vector;

pub use entity::{Entity, EntityError, EntityKind, EntityRecord, Momentum, Position, Step};
pub use ids::{EntityId, RunId};
pub use scalar::Scalar;
pub use snapshot::Snapshot;
pub use vector::{MAX_DIMENSIONS, Vector, VectorError};
