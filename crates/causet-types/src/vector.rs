//! N-dimensional vectors of [`Scalar`] components.
//!
//! The dimension count is fixed per substrate instance; every operation that
//! combines two vectors checks that their dimension counts agree.

use serde::{Deserialize, Serialize};

use crate::scalar::Scalar;

/// Upper bound on the dimension count of a substrate or snapshot.
pub const MAX_DIMENSIONS: u32 = 64;

/// Errors from vector arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorError {
    /// The two operands have a different number of components.
    #[error("dimension mismatch: left has {left}, right has {right}")]
    DimensionMismatch {
        /// Dimension count of the left operand.
        left: usize,
        /// Dimension count of the right operand.
        right: usize,
    },
}

/// Ordered sequence of D scalars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector(Vec<Scalar>);

impl Vector {
    /// The zero vector with `dimensions` components.
    pub fn zero(dimensions: usize) -> Self {
        Self(vec![Scalar::ZERO; dimensions])
    }

    /// Build a vector from its components.
    pub const fn from_components(components: Vec<Scalar>) -> Self {
        Self(components)
    }

    /// Number of components.
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Borrow the components.
    pub fn components(&self) -> &[Scalar] {
        &self.0
    }

    /// Consume into the component list.
    pub fn into_components(self) -> Vec<Scalar> {
        self.0
    }

    /// Component at `axis`, if the axis exists.
    pub fn get(&self, axis: usize) -> Option<&Scalar> {
        self.0.get(axis)
    }

    /// Whether every component is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(Scalar::is_zero)
    }

    /// Elementwise sum.
    pub fn try_add(&self, other: &Self) -> Result<Self, VectorError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise difference.
    pub fn try_sub(&self, other: &Self) -> Result<Self, VectorError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Multiply every component by `factor`.
    #[must_use]
    pub fn scale(&self, factor: &Scalar) -> Self {
        Self(self.0.iter().map(|c| c * factor).collect())
    }

    /// Largest absolute component (zero for a zero-dimensional vector).
    pub fn chebyshev_norm(&self) -> Scalar {
        self.0
            .iter()
            .map(Scalar::abs)
            .max()
            .unwrap_or(Scalar::ZERO)
    }

    /// Copy of this vector with `delta` added to one axis.
    ///
    /// Returns `None` if the axis does not exist.
    pub fn offset_axis(&self, axis: usize, delta: &Scalar) -> Option<Self> {
        let mut components = self.0.clone();
        let slot = components.get_mut(axis)?;
        *slot = &*slot + delta;
        Some(Self(components))
    }

    /// The 2·D von-Neumann neighbours: ±1 along each axis.
    pub fn axis_neighbors(&self) -> Vec<Self> {
        let one = Scalar::one();
        let minus_one = -&one;
        let mut out = Vec::with_capacity(self.0.len().saturating_mul(2));
        for axis in 0..self.0.len() {
            if let Some(up) = self.offset_axis(axis, &one) {
                out.push(up);
            }
            if let Some(down) = self.offset_axis(axis, &minus_one) {
                out.push(down);
            }
        }
        out
    }

    fn zip_with(
        &self,
        other: &Self,
        f: impl Fn(&Scalar, &Scalar) -> Scalar,
    ) -> Result<Self, VectorError> {
        if self.0.len() != other.0.len() {
            return Err(VectorError::DimensionMismatch {
                left: self.0.len(),
                right: other.0.len(),
            });
        }
        Ok(Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        ))
    }
}

impl From<Vec<i64>> for Vector {
    fn from(components: Vec<i64>) -> Self {
        Self(components.into_iter().map(Scalar::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector() {
        let v = Vector::zero(3);
        assert_eq!(v.dimensions(), 3);
        assert!(v.is_zero());
    }

    #[test]
    fn elementwise_arithmetic() {
        let a = Vector::from(vec![1, 2, 3]);
        let b = Vector::from(vec![10, -20, 30]);
        assert_eq!(a.try_add(&b).unwrap(), Vector::from(vec![11, -18, 33]));
        assert_eq!(b.try_sub(&a).unwrap(), Vector::from(vec![9, -22, 27]));
        assert_eq!(a.scale(&Scalar::from(2_i64)), Vector::from(vec![2, 4, 6]));
    }

    #[test]
    fn mismatched_dimensions_rejected() {
        let a = Vector::zero(2);
        let b = Vector::zero(3);
        assert_eq!(
            a.try_add(&b),
            Err(VectorError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn neighbors_cover_each_axis_both_ways() {
        let origin = Vector::zero(2);
        let neighbors = origin.axis_neighbors();
        assert_eq!(neighbors.len(), 4);
        assert!(neighbors.contains(&Vector::from(vec![1, 0])));
        assert!(neighbors.contains(&Vector::from(vec![-1, 0])));
        assert!(neighbors.contains(&Vector::from(vec![0, 1])));
        assert!(neighbors.contains(&Vector::from(vec![0, -1])));
    }

    #[test]
    fn chebyshev_norm_is_max_abs() {
        assert_eq!(
            Vector::from(vec![3, -7, 2]).chebyshev_norm(),
            Scalar::from(7_i64)
        );
        assert_eq!(Vector::zero(0).chebyshev_norm(), Scalar::ZERO);
    }
}
