//! Deterministic Q31.32 fixed-point scalar.
//!
//! Hardware floating point can round differently between architectures and
//! compilers (x86 vs ARM vs WASM). Every operation in this module is plain
//! integer arithmetic, so all clients in a lockstep session compute
//! bit-identical results.
//!
//! Overflow saturates at [`Fix64::MAX`] / [`Fix64::MIN`]. Division by zero
//! saturates towards the sign of the numerator and `0 / 0` is zero, so no
//! operation here ever panics.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

const FRACTIONAL_BITS: u32 = 32;
const ONE_RAW: i64 = 1 << FRACTIONAL_BITS;
const ONE_F64: f64 = 4_294_967_296.0;

/// Number of odd Taylor terms used by `sin` after folding into `[-PI/2, PI/2]`.
const SIN_TERMS: i64 = 7;
/// Number of series terms used by `atan` after two half-angle reductions.
const ATAN_TERMS: i64 = 8;

/// Signed fixed-point number with 32 integer and 32 fractional bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fix64(i64);

impl Fix64 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_RAW);
    pub const HALF: Self = Self(ONE_RAW >> 1);
    pub const TWO: Self = Self(ONE_RAW << 1);
    pub const PI: Self = Self(13_493_037_705);
    pub const PI_OVER_2: Self = Self(6_746_518_852);
    pub const PI_TIMES_2: Self = Self(26_986_075_409);
    pub const MAX: Self = Self(i64::MAX);
    pub const MIN: Self = Self(i64::MIN);
    /// Smallest representable positive value.
    pub const EPSILON: Self = Self(1);

    /// Wraps a raw Q31.32 value.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw Q31.32 value.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self((value as i64) << FRACTIONAL_BITS)
    }

    /// Exact `numerator / denominator`, truncated toward zero.
    pub fn from_ratio(numerator: i32, denominator: i32) -> Self {
        Self::from_int(numerator) / Self::from_int(denominator)
    }

    /// Converts a float literal. Only meant for tuning constants and tests;
    /// simulation code must never feed runtime floats into the lockstep state.
    pub fn from_f64(value: f64) -> Self {
        Self((value * ONE_F64).round() as i64)
    }

    pub fn from_f32(value: f32) -> Self {
        Self::from_f64(value as f64)
    }

    /// Lossy conversion for presentation code.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE_F64
    }

    pub fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }

    /// Integer part, rounded toward negative infinity.
    #[inline]
    pub const fn floor_to_int(self) -> i64 {
        self.0 >> FRACTIONAL_BITS
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// `-1`, `0` or `1` with the sign of `self`.
    #[inline]
    pub const fn sign(self) -> Self {
        Self(self.0.signum() << FRACTIONAL_BITS)
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Clamps to `[0, 1]`.
    pub fn clamp01(self) -> Self {
        self.clamp(Self::ZERO, Self::ONE)
    }

    /// Divides by a plain integer without the widening shift of `/`.
    #[inline]
    fn div_int(self, divisor: i64) -> Self {
        Self(self.0 / divisor)
    }

    /// Square root. Negative inputs yield zero.
    pub fn sqrt(self) -> Self {
        if self.0 <= 0 {
            return Self::ZERO;
        }

        // sqrt(raw / 2^32) * 2^32 == sqrt(raw * 2^32)
        let widened = (self.0 as u128) << FRACTIONAL_BITS;
        Self(isqrt(widened) as i64)
    }

    /// Sine of an angle in radians.
    pub fn sin(self) -> Self {
        // Reduce to (-PI, PI]
        let mut x = self.0.rem_euclid(Self::PI_TIMES_2.0);
        if x > Self::PI.0 {
            x -= Self::PI_TIMES_2.0;
        }

        // sin(PI - x) == sin(x) folds the range to [-PI/2, PI/2]
        if x > Self::PI_OVER_2.0 {
            x = Self::PI.0 - x;
        } else if x < -Self::PI_OVER_2.0 {
            x = -Self::PI.0 - x;
        }

        sin_series(Self(x))
    }

    /// Cosine of an angle in radians.
    pub fn cos(self) -> Self {
        let reduced = self.0.rem_euclid(Self::PI_TIMES_2.0);
        Self(reduced + Self::PI_OVER_2.0).sin()
    }

    /// Arc tangent in `[-PI/2, PI/2]`.
    pub fn atan(self) -> Self {
        if self.0 == 0 {
            return Self::ZERO;
        }

        let negative = self.0 < 0;
        let mut z = self.abs();

        // atan(z) = PI/2 - atan(1/z) for z > 1
        let inverted = z > Self::ONE;
        if inverted {
            z = Self::ONE / z;
        }

        // atan(z) = 2 * atan(z / (1 + sqrt(1 + z^2))), applied twice
        for _ in 0..2 {
            z = z / (Self::ONE + (Self::ONE + z * z).sqrt());
        }

        let z2 = z * z;
        let mut term = z;
        let mut sum = z;
        for n in 1..=ATAN_TERMS {
            term = term * z2;
            let contribution = term.div_int(2 * n + 1);
            if n % 2 == 1 {
                sum -= contribution;
            } else {
                sum += contribution;
            }
        }

        let mut result = Self(sum.0 << 2);
        if inverted {
            result = Self::PI_OVER_2 - result;
        }
        if negative {
            -result
        } else {
            result
        }
    }

    /// Four-quadrant arc tangent of `y / x` in `[-PI, PI]`.
    ///
    /// `atan2(0, 0)` is zero.
    pub fn atan2(y: Self, x: Self) -> Self {
        if x.0 == 0 && y.0 == 0 {
            return Self::ZERO;
        }

        // Keep the ratio within [-1, 1] so the quotient never loses precision.
        if x.abs() >= y.abs() {
            let angle = (y / x).atan();
            if x.0 > 0 {
                angle
            } else if y.0 >= 0 {
                angle + Self::PI
            } else {
                angle - Self::PI
            }
        } else {
            let angle = (x / y).atan();
            if y.0 > 0 {
                Self::PI_OVER_2 - angle
            } else {
                -Self::PI_OVER_2 - angle
            }
        }
    }

    /// Arc sine in `[-PI/2, PI/2]`. The input is clamped to `[-1, 1]`.
    pub fn asin(self) -> Self {
        let x = self.clamp(-Self::ONE, Self::ONE);
        Self::atan2(x, (Self::ONE - x * x).sqrt())
    }

    /// Arc cosine in `[0, PI]`. The input is clamped to `[-1, 1]`.
    pub fn acos(self) -> Self {
        let x = self.clamp(-Self::ONE, Self::ONE);
        Self::atan2((Self::ONE - x * x).sqrt(), x)
    }
}

/// Odd Taylor polynomial for sine, Horner form, valid on `[-PI/2, PI/2]`.
fn sin_series(x: Fix64) -> Fix64 {
    let x2 = x * x;
    let mut acc = Fix64::ONE;
    for k in (1..=SIN_TERMS).rev() {
        acc = Fix64::ONE - (x2 * acc).div_int((2 * k) * (2 * k + 1));
    }
    x * acc
}

/// Floor of the square root (Newton iteration from an upper bound).
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }

    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[inline]
fn saturate(value: i128) -> i64 {
    if value > i64::MAX as i128 {
        i64::MAX
    } else if value < i64::MIN as i128 {
        i64::MIN
    } else {
        value as i64
    }
}

impl Add for Fix64 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Fix64 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Mul for Fix64 {
    type Output = Self;

    /// Rounds to nearest.
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let product = self.0 as i128 * rhs.0 as i128;
        let rounded = (product + (1i128 << (FRACTIONAL_BITS - 1))) >> FRACTIONAL_BITS;
        Self(saturate(rounded))
    }
}

impl Div for Fix64 {
    type Output = Self;

    /// Truncates toward zero. Division by zero saturates to the numerator's sign.
    #[inline]
    fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            return match self.0.signum() {
                1 => Self::MAX,
                -1 => Self::MIN,
                _ => Self::ZERO,
            };
        }

        let quotient = ((self.0 as i128) << FRACTIONAL_BITS) / rhs.0 as i128;
        Self(saturate(quotient))
    }
}

impl Neg for Fix64 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl AddAssign for Fix64 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Fix64 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Fix64 {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Fix64 {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Sum for Fix64 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i32> for Fix64 {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl fmt::Debug for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fix64({})", self.to_f64())
    }
}

impl fmt::Display for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
