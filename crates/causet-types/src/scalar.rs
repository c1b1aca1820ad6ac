//! Arbitrary-precision scalar used for ticks, energy, and generation weights.
//!
//! Simulated time and accumulated energy grow without bound over a long run,
//! so they are never stored in fixed-width integers. [`Scalar`] wraps a
//! signed [`BigInt`] and exposes the small arithmetic surface the substrate
//! needs. Conversions to fixed-width integers are explicit and fallible; the
//! wire formats are the only place they happen.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Rem, Sub};

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Signed arbitrary-precision integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scalar(BigInt);

impl Scalar {
    /// The additive identity.
    pub const ZERO: Self = Self(BigInt::ZERO);

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self(BigInt::one())
    }

    /// Wrap an existing [`BigInt`].
    pub const fn from_bigint(value: BigInt) -> Self {
        Self(value)
    }

    /// Borrow the inner [`BigInt`].
    pub const fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    /// Whether this value equals zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether this value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Truncating division, or `None` if `divisor` is zero.
    pub fn checked_div(&self, divisor: &Self) -> Option<Self> {
        if divisor.is_zero() {
            None
        } else {
            Some(Self(&self.0 / &divisor.0))
        }
    }

    /// Remainder with the sign of `self`, or `None` if `divisor` is zero.
    pub fn checked_rem(&self, divisor: &Self) -> Option<Self> {
        if divisor.is_zero() {
            None
        } else {
            Some(Self(&self.0 % &divisor.0))
        }
    }

    /// Whether `self` is a multiple of `period`. A zero period never matches.
    pub fn is_multiple_of(&self, period: &Self) -> bool {
        self.checked_rem(period).is_some_and(|r| r.is_zero())
    }

    /// Convert to `i64` if the value fits.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// Convert to `u64` if the value fits (non-negative and in range).
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    /// Lossy conversion to `f64`; saturates to infinity for huge magnitudes.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(if self.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self(BigInt::from(value))
                }
            }
        )*
    };
}

scalar_from!(i32, i64, u32, u64, usize);

impl From<BigInt> for Scalar {
    fn from(value: BigInt) -> Self {
        Self(value)
    }
}

/// Implements a binary operator for every owned/borrowed operand combination.
macro_rules! scalar_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Scalar> for &Scalar {
            type Output = Scalar;
            fn $method(self, rhs: &Scalar) -> Scalar {
                Scalar(&self.0 $op &rhs.0)
            }
        }

        impl $trait<Scalar> for Scalar {
            type Output = Scalar;
            fn $method(self, rhs: Scalar) -> Scalar {
                Scalar(self.0 $op rhs.0)
            }
        }

        impl $trait<&Scalar> for Scalar {
            type Output = Scalar;
            fn $method(self, rhs: &Scalar) -> Scalar {
                Scalar(self.0 $op &rhs.0)
            }
        }

        impl $trait<Scalar> for &Scalar {
            type Output = Scalar;
            fn $method(self, rhs: Scalar) -> Scalar {
                Scalar(&self.0 $op rhs.0)
            }
        }
    };
}

scalar_binop!(Add, add, +);
scalar_binop!(Sub, sub, -);
scalar_binop!(Mul, mul, *);

// Division and remainder panic on a zero divisor, exactly like the
// primitive integer operators. Use `checked_div`/`checked_rem` when the
// divisor comes from configuration or input.
scalar_binop!(Div, div, /);
scalar_binop!(Rem, rem, %);

impl Neg for Scalar {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Neg for &Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        Scalar(-&self.0)
    }
}

impl core::iter::Sum for Scalar {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl<'a> core::iter::Sum<&'a Scalar> for Scalar {
    fn sum<I: Iterator<Item = &'a Scalar>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}
