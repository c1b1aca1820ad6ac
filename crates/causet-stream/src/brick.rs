//! Brick quantisation of a snapshot's energy and momentum field.
//!
//! The substrate is projected onto its first three axes (missing axes read
//! as zero, extra axes are ignored) and cut into cubic bricks of
//! `brick_size` cells, aligned to multiples of `brick_size`. Only bricks
//! that hold at least one entity and whose centre lies within the camera's
//! horizon are produced. The horizon is a sphere around the camera
//! position; the view direction plays no part in selection.
//!
//! Per cell:
//!
//! - energy is the sum of resident energies, clamped to `0..=energy_max`
//!   and mapped linearly onto `0..=255`
//! - momentum is the per-axis sum of resident momentum vectors in Q8.8
//!   fixed point (`round(v * 256)`, saturating at the `i16` range), three
//!   values per cell
//! - one even-parity bit of the energy byte, packed LSB-first, eight
//!   cells per byte
//!
//! Cells are laid out x-fastest: `index = x + size * (y + size * z)`.

use std::collections::BTreeMap;

use causet_core::config::StreamConfig;
use causet_types::{Snapshot, Vector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::error::StreamError;

/// Largest accepted brick edge, shared with config validation.
pub use causet_core::config::MAX_BRICK_SIZE;

/// Axes carried by the stream.
pub const STREAM_AXES: usize = 3;

/// Fixed-point scale of quantised momentum.
pub const MOMENTUM_SCALE: f64 = 256.0;

/// One quantised chunk of the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Brick {
    /// Lowest cell of the brick.
    #[ts(type = "[number, number, number]")]
    pub origin: [i64; 3],
    /// Cells along each axis.
    pub dims: [u16; 3],
    /// Quantised energy per cell.
    pub energy_u8: Vec<u8>,
    /// Even-parity bit per energy byte, LSB-first.
    pub parity_bits: Vec<u8>,
    /// Q8.8 momentum, three components per cell.
    pub momentum_q: Vec<i16>,
}

impl Brick {
    /// Quantise a raw grid.
    ///
    /// `energy` holds one value per cell and `momentum` three per cell, both
    /// x-fastest.
    pub fn from_grid(
        origin: [i64; 3],
        dims: [u16; 3],
        energy: &[f64],
        momentum: &[f64],
        energy_max: f64,
    ) -> Result<Self, StreamError> {
        let cells = cell_count(dims)
            .ok_or_else(|| StreamError::malformed(format!("brick dims {dims:?} are empty")))?;
        if energy.len() != cells {
            return Err(StreamError::malformed(format!(
                "energy grid has {} cells, dims {dims:?} need {cells}",
                energy.len()
            )));
        }
        if momentum.len() != cells.saturating_mul(STREAM_AXES) {
            return Err(StreamError::malformed(format!(
                "momentum grid has {} values, dims {dims:?} need {}",
                momentum.len(),
                cells.saturating_mul(STREAM_AXES)
            )));
        }
        Ok(Self::quantized(origin, dims, energy, momentum, energy_max))
    }

    fn quantized(
        origin: [i64; 3],
        dims: [u16; 3],
        energy: &[f64],
        momentum: &[f64],
        energy_max: f64,
    ) -> Self {
        let energy_u8: Vec<u8> = energy
            .iter()
            .map(|&e| quantize_energy(e, energy_max))
            .collect();
        let parity_bits = parity_bits(&energy_u8);
        Self {
            origin,
            dims,
            energy_u8,
            parity_bits,
            momentum_q: momentum.iter().copied().map(quantize_momentum).collect(),
        }
    }

    /// Number of cells.
    pub fn cells(&self) -> usize {
        self.energy_u8.len()
    }

    /// Check the brick's arrays against its dims and recompute parity.
    pub fn verify(&self) -> Result<(), StreamError> {
        let cells = cell_count(self.dims).ok_or_else(|| {
            StreamError::malformed(format!("brick at {:?} has empty dims", self.origin))
        })?;
        if self.energy_u8.len() != cells {
            return Err(StreamError::malformed(format!(
                "brick at {:?}: energyU8 has {} cells, dims need {cells}",
                self.origin,
                self.energy_u8.len()
            )));
        }
        if self.momentum_q.len() != cells.saturating_mul(STREAM_AXES) {
            return Err(StreamError::malformed(format!(
                "brick at {:?}: momentumQ has {} values, dims need {}",
                self.origin,
                self.momentum_q.len(),
                cells.saturating_mul(STREAM_AXES)
            )));
        }
        if self.parity_bits != parity_bits(&self.energy_u8) {
            return Err(StreamError::malformed(format!(
                "brick at {:?}: parity mismatch",
                self.origin
            )));
        }
        Ok(())
    }
}

/// Product of the dims, or `None` if any is zero.
fn cell_count(dims: [u16; 3]) -> Option<usize> {
    dims.iter().try_fold(1_usize, |acc, &d| {
        if d == 0 {
            None
        } else {
            acc.checked_mul(usize::from(d))
        }
    })
}

/// Map an energy onto `0..=255`, clamping to `0..=energy_max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_energy(energy: f64, energy_max: f64) -> u8 {
    if energy.is_nan() || energy_max <= 0.0 {
        return 0;
    }
    (energy.clamp(0.0, energy_max) / energy_max * 255.0).round() as u8
}

/// Q8.8 fixed point, saturating.
#[allow(clippy::cast_possible_truncation)]
pub fn quantize_momentum(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    (value * MOMENTUM_SCALE)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Inverse of [`quantize_momentum`], up to rounding.
pub fn dequantize_momentum(q: i16) -> f64 {
    f64::from(q) / MOMENTUM_SCALE
}

/// One even-parity bit per byte, packed LSB-first.
pub fn parity_bits(energy: &[u8]) -> Vec<u8> {
    let mut bits = vec![0_u8; energy.len().div_ceil(8)];
    for (i, byte) in energy.iter().enumerate() {
        if byte.count_ones() % 2 == 0 {
            continue;
        }
        if let Some(slot) = bits.get_mut(i / 8) {
            *slot |= 1_u8 << (i % 8);
        }
    }
    bits
}

// ---------------------------------------------------------------------------
// Quantizer
// ---------------------------------------------------------------------------

/// Turns snapshots into visible bricks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrickQuantizer {
    brick_size: u16,
    horizon: f32,
    energy_max: f64,
}

struct Grid {
    energy: Vec<f64>,
    momentum: Vec<f64>,
}

impl BrickQuantizer {
    /// Validate and build a quantizer.
    pub fn new(brick_size: u32, horizon: f32, energy_max: f64) -> Result<Self, StreamError> {
        if brick_size == 0 || brick_size > MAX_BRICK_SIZE {
            return Err(StreamError::InvalidParameter {
                name: "brick_size",
                reason: format!("{brick_size} is outside 1..={MAX_BRICK_SIZE}"),
            });
        }
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(StreamError::InvalidParameter {
                name: "horizon",
                reason: format!("{horizon} is not a finite non-negative distance"),
            });
        }
        if !energy_max.is_finite() || energy_max <= 0.0 {
            return Err(StreamError::InvalidParameter {
                name: "energy_max",
                reason: format!("{energy_max} is not a finite positive energy"),
            });
        }
        let brick_size = u16::try_from(brick_size).map_err(|e| StreamError::InvalidParameter {
            name: "brick_size",
            reason: e.to_string(),
        })?;
        Ok(Self {
            brick_size,
            horizon,
            energy_max,
        })
    }

    /// Build from the `stream` config section.
    pub fn from_config(config: &StreamConfig) -> Result<Self, StreamError> {
        Self::new(config.brick_size, config.horizon, config.energy_max)
    }

    /// Brick edge in cells.
    pub fn brick_size(&self) -> u32 {
        u32::from(self.brick_size)
    }

    /// Visibility radius around the camera.
    pub const fn horizon(&self) -> f32 {
        self.horizon
    }

    /// Energy that quantises to 255.
    pub const fn energy_max(&self) -> f64 {
        self.energy_max
    }

    /// Origin of the brick containing `cell`.
    pub fn brick_origin(&self, cell: [i64; 3]) -> [i64; 3] {
        let size = i64::from(self.brick_size);
        cell.map(|c| c.div_euclid(size).saturating_mul(size))
    }

    /// Whether the brick at `origin` has its centre within the horizon of
    /// `eye`.
    #[allow(clippy::cast_precision_loss)]
    pub fn is_visible(&self, origin: [i64; 3], eye: [f32; 3]) -> bool {
        let half = f32::from(self.brick_size) / 2.0;
        let dist_sq: f32 = origin
            .iter()
            .zip(eye)
            .map(|(&o, e)| {
                let d = o as f32 + half - e;
                d * d
            })
            .sum();
        dist_sq <= self.horizon * self.horizon
    }

    /// Quantise every visible, non-empty brick of `snapshot`, ordered by
    /// origin.
    pub fn quantize(&self, snapshot: &Snapshot, eye: [f32; 3]) -> Vec<Brick> {
        let side = usize::from(self.brick_size);
        let cells = side.saturating_mul(side).saturating_mul(side);
        let mut grids: BTreeMap<[i64; 3], Grid> = BTreeMap::new();
        let mut unprojectable = 0_usize;

        for record in &snapshot.entities {
            let Some(cell) = project(record.position.vector()) else {
                unprojectable = unprojectable.saturating_add(1);
                continue;
            };
            let origin = self.brick_origin(cell);
            if !self.is_visible(origin, eye) {
                continue;
            }
            let Some(index) = local_index(cell, origin, side) else {
                continue;
            };
            let grid = grids.entry(origin).or_insert_with(|| Grid {
                energy: vec![0.0; cells],
                momentum: vec![0.0; cells.saturating_mul(STREAM_AXES)],
            });
            if let Some(e) = grid.energy.get_mut(index) {
                *e += record.energy.to_f64();
            }
            for axis in 0..STREAM_AXES {
                let value = record.momentum.vector.get(axis).map_or(0.0, |c| c.to_f64());
                if let Some(m) = grid.momentum.get_mut(index * STREAM_AXES + axis) {
                    *m += value;
                }
            }
        }

        if unprojectable > 0 {
            debug!(
                tick = %snapshot.tick,
                unprojectable,
                "entities outside the streamable coordinate range skipped"
            );
        }

        let dims = [self.brick_size; 3];
        grids
            .into_iter()
            .map(|(origin, grid)| {
                Brick::quantized(origin, dims, &grid.energy, &grid.momentum, self.energy_max)
            })
            .collect()
    }
}

/// First three axes as cell coordinates; `None` if one exceeds `i64`.
fn project(position: &Vector) -> Option<[i64; 3]> {
    let mut cell = [0_i64; 3];
    for (axis, slot) in cell.iter_mut().enumerate() {
        if let Some(c) = position.get(axis) {
            *slot = c.to_i64()?;
        }
    }
    Some(cell)
}

fn local_index(cell: [i64; 3], origin: [i64; 3], side: usize) -> Option<usize> {
    let mut local = [0_usize; 3];
    for ((slot, c), o) in local.iter_mut().zip(cell).zip(origin) {
        *slot = usize::try_from(c.checked_sub(o)?).ok()?;
    }
    let [x, y, z] = local;
    Some(x + side * (y + side * z))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use causet_types::{EntityRecord, Momentum, Position, Scalar};

    use super::*;

    fn record(position: Vec<i64>, energy: i64, momentum: Vec<i64>) -> EntityRecord {
        EntityRecord {
            position: Position::from(position),
            energy: Scalar::from(energy),
            generation: Scalar::one(),
            momentum: Momentum {
                cost: Scalar::ZERO,
                vector: Vector::from(momentum),
            },
            birth_tick: Scalar::ZERO,
        }
    }

    #[test]
    fn all_zero_grid_quantizes_to_zeros_with_zero_parity() {
        let dims = [4, 4, 2];
        let brick = Brick::from_grid([0, 0, 0], dims, &[0.0; 32], &[0.0; 96], 100.0).unwrap();
        assert_eq!(brick.energy_u8, vec![0; 32]);
        assert_eq!(brick.parity_bits, vec![0; 4]);
        assert_eq!(brick.momentum_q, vec![0; 96]);
        brick.verify().unwrap();
    }

    #[test]
    fn energy_quantization_clamps_and_rounds() {
        assert_eq!(quantize_energy(0.0, 10.0), 0);
        assert_eq!(quantize_energy(-5.0, 10.0), 0);
        assert_eq!(quantize_energy(10.0, 10.0), 255);
        assert_eq!(quantize_energy(1e9, 10.0), 255);
        assert_eq!(quantize_energy(5.0, 10.0), 128);
        assert_eq!(quantize_energy(f64::NAN, 10.0), 0);
    }

    #[test]
    fn momentum_is_q8_8_and_saturates() {
        assert_eq!(quantize_momentum(1.0), 256);
        assert_eq!(quantize_momentum(-0.5), -128);
        assert_eq!(quantize_momentum(1000.0), i16::MAX);
        assert_eq!(quantize_momentum(-1000.0), i16::MIN);
        assert!((dequantize_momentum(quantize_momentum(2.25)) - 2.25).abs() < f64::EPSILON);
    }

    #[test]
    fn parity_is_even_and_lsb_first() {
        // 0b1 (odd), 0b11 (even), 0b111 (odd), 0 ... ninth byte odd.
        let bytes = [1, 3, 7, 0, 0, 0, 0, 0, 128];
        assert_eq!(parity_bits(&bytes), vec![0b0000_0101, 0b0000_0001]);
    }

    #[test]
    fn grid_length_mismatch_is_rejected() {
        assert!(Brick::from_grid([0; 3], [2, 2, 2], &[0.0; 7], &[0.0; 24], 1.0).is_err());
        assert!(Brick::from_grid([0; 3], [2, 2, 2], &[0.0; 8], &[0.0; 23], 1.0).is_err());
        assert!(Brick::from_grid([0; 3], [0, 2, 2], &[], &[], 1.0).is_err());
    }

    #[test]
    fn verify_catches_flipped_energy() {
        let mut brick =
            Brick::from_grid([0; 3], [2, 1, 1], &[3.0, 0.0], &[0.0; 6], 255.0).unwrap();
        brick.verify().unwrap();
        brick.energy_u8[0] ^= 0b0000_0001;
        assert!(brick.verify().is_err());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(BrickQuantizer::new(0, 10.0, 1.0).is_err());
        assert!(BrickQuantizer::new(MAX_BRICK_SIZE + 1, 10.0, 1.0).is_err());
        assert!(BrickQuantizer::new(4, -1.0, 1.0).is_err());
        assert!(BrickQuantizer::new(4, 10.0, 0.0).is_err());
        assert!(BrickQuantizer::new(4, 10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn origins_align_for_negative_cells() {
        let q = BrickQuantizer::new(4, 100.0, 10.0).unwrap();
        assert_eq!(q.brick_origin([0, 3, 4]), [0, 0, 4]);
        assert_eq!(q.brick_origin([-1, -4, -5]), [-4, -4, -8]);
    }

    #[test]
    fn cells_accumulate_and_lay_out_x_fastest() {
        let q = BrickQuantizer::new(2, 100.0, 10.0).unwrap();
        let snap = Snapshot::new(
            Scalar::from(5_u32),
            3,
            vec![
                record(vec![1, 0, 0], 4, vec![1, 0, 0]),
                record(vec![1, 0, 0], 6, vec![0, 2, 0]),
                record(vec![0, 1, 1], 5, vec![0, 0, -1]),
            ],
        );
        let bricks = q.quantize(&snap, [0.0; 3]);
        assert_eq!(bricks.len(), 1);
        let brick = &bricks[0];
        assert_eq!(brick.origin, [0, 0, 0]);
        assert_eq!(brick.dims, [2, 2, 2]);
        // Cell (1,0,0) -> index 1: energies 4 + 6 = 10 = energy_max.
        assert_eq!(brick.energy_u8[1], 255);
        assert_eq!(&brick.momentum_q[3..6], &[256, 512, 0]);
        // Cell (0,1,1) -> index 0 + 2 * (1 + 2 * 1) = 6.
        assert_eq!(brick.energy_u8[6], 128);
        assert_eq!(&brick.momentum_q[18..21], &[0, 0, -256]);
        assert_eq!(brick.energy_u8.iter().filter(|&&e| e != 0).count(), 2);
        brick.verify().unwrap();
    }

    #[test]
    fn only_bricks_within_horizon_are_produced() {
        let q = BrickQuantizer::new(4, 10.0, 10.0).unwrap();
        let snap = Snapshot::new(
            Scalar::from(1_u32),
            3,
            vec![
                record(vec![1, 1, 1], 1, vec![0, 0, 0]),
                record(vec![40, 0, 0], 1, vec![0, 0, 0]),
                record(vec![-6, 0, 0], 1, vec![0, 0, 0]),
            ],
        );
        let origins: Vec<_> = q.quantize(&snap, [0.0; 3]).iter().map(|b| b.origin).collect();
        assert_eq!(origins, vec![[-8, 0, 0], [0, 0, 0]]);

        let far: Vec<_> = q.quantize(&snap, [42.0, 2.0, 2.0]).iter().map(|b| b.origin).collect();
        assert_eq!(far, vec![[40, 0, 0]]);
    }

    #[test]
    fn lower_dimensions_pad_and_higher_are_ignored() {
        let q = BrickQuantizer::new(2, 100.0, 10.0).unwrap();
        let flat = Snapshot::new(Scalar::ZERO, 1, vec![record(vec![3], 2, vec![1])]);
        let bricks = q.quantize(&flat, [0.0; 3]);
        assert_eq!(bricks[0].origin, [2, 0, 0]);
        assert_eq!(&bricks[0].momentum_q[3..6], &[256, 0, 0]);

        let wide = Snapshot::new(
            Scalar::ZERO,
            5,
            vec![record(vec![0, 0, 0, 99, -99], 2, vec![0, 0, 0, 7, 7])],
        );
        let bricks = q.quantize(&wide, [0.0; 3]);
        assert_eq!(bricks[0].origin, [0, 0, 0]);
        assert!(bricks[0].momentum_q.iter().all(|&m| m == 0));
    }

    #[test]
    fn empty_snapshot_has_no_bricks() {
        let q = BrickQuantizer::new(8, 96.0, 1024.0).unwrap();
        let snap = Snapshot::new(Scalar::ZERO, 3, Vec::new());
        assert!(q.quantize(&snap, [0.0; 3]).is_empty());
    }
}
