//! Deterministic 3D vector over [`Fix64`].
//!
//! Mirrors the usual engine vector API (Unity-style names) so gameplay code can
//! move positions and directions through lockstep frames without floats.

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::fix64::Fix64;
use crate::quaternion::Quaternion;

/// 3-component fixed-point vector. Copied by value on every operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: Fix64,
    pub y: Fix64,
    pub z: Fix64,
}

impl Vector3 {
    /// Magnitudes below this normalize to [`Vector3::ZERO`] (1e-5).
    pub const K_EPSILON: Fix64 = Fix64::from_raw(42_950);

    pub const ZERO: Self = Self::new(Fix64::ZERO, Fix64::ZERO, Fix64::ZERO);
    pub const ONE: Self = Self::new(Fix64::ONE, Fix64::ONE, Fix64::ONE);
    pub const FORWARD: Self = Self::new(Fix64::ZERO, Fix64::ZERO, Fix64::ONE);
    pub const BACK: Self = Self::new(Fix64::ZERO, Fix64::ZERO, Fix64::from_int(-1));
    pub const RIGHT: Self = Self::new(Fix64::ONE, Fix64::ZERO, Fix64::ZERO);
    pub const LEFT: Self = Self::new(Fix64::from_int(-1), Fix64::ZERO, Fix64::ZERO);
    pub const UP: Self = Self::new(Fix64::ZERO, Fix64::ONE, Fix64::ZERO);
    pub const DOWN: Self = Self::new(Fix64::ZERO, Fix64::from_int(-1), Fix64::ZERO);
    pub const POSITIVE_INFINITY: Self = Self::new(Fix64::MAX, Fix64::MAX, Fix64::MAX);
    pub const NEGATIVE_INFINITY: Self = Self::new(Fix64::MIN, Fix64::MIN, Fix64::MIN);

    #[inline]
    pub const fn new(x: Fix64, y: Fix64, z: Fix64) -> Self {
        Self { x, y, z }
    }

    /// Vector in the XY plane (z = 0).
    #[inline]
    pub const fn new_xy(x: Fix64, y: Fix64) -> Self {
        Self::new(x, y, Fix64::ZERO)
    }

    /// Integer components, convenient for tests and level data.
    pub const fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self::new(Fix64::from_int(x), Fix64::from_int(y), Fix64::from_int(z))
    }

    pub fn set(&mut self, x: Fix64, y: Fix64, z: Fix64) {
        self.x = x;
        self.y = y;
        self.z = z;
    }

    #[inline]
    pub fn sqr_magnitude(self) -> Fix64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline]
    pub fn magnitude(self) -> Fix64 {
        self.sqr_magnitude().sqrt()
    }

    /// Unit vector in the same direction, or [`Vector3::ZERO`] when the
    /// magnitude is below [`Vector3::K_EPSILON`].
    pub fn normalized(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude < Self::K_EPSILON {
            return Self::ZERO;
        }

        let length_inv = Fix64::ONE / magnitude;
        self * length_inv
    }

    /// Normalizes in place. A near-zero vector is left untouched.
    pub fn normalize(&mut self) {
        let magnitude = self.magnitude();
        if magnitude >= Self::K_EPSILON {
            *self = *self * (Fix64::ONE / magnitude);
        }
    }

    #[inline]
    pub fn dot(lhs: Self, rhs: Self) -> Fix64 {
        lhs.x * rhs.x + lhs.y * rhs.y + lhs.z * rhs.z
    }

    /// Right-handed cross product.
    pub fn cross(lhs: Self, rhs: Self) -> Self {
        Self::new(
            lhs.y * rhs.z - lhs.z * rhs.y,
            -(lhs.x * rhs.z - lhs.z * rhs.x),
            lhs.x * rhs.y - lhs.y * rhs.x,
        )
    }

    pub fn distance(a: Self, b: Self) -> Fix64 {
        (a - b).magnitude()
    }

    /// Angle in radians between two vectors.
    ///
    /// Not guarded: a zero-length input divides by zero and the result is
    /// whatever [`Fix64`]'s saturating division yields.
    pub fn angle(from: Self, to: Self) -> Fix64 {
        (Self::dot(from, to) / (from.magnitude() * to.magnitude())).acos()
    }

    /// Angle in radians, negative when `from x to` points away from `axis`.
    pub fn signed_angle(from: Self, to: Self, axis: Self) -> Fix64 {
        let angle = Self::angle(from, to);
        if Self::dot(Self::cross(from, to), axis) < Fix64::ZERO {
            -angle
        } else {
            angle
        }
    }

    /// Returns `vector` shortened to `max_length`, or unchanged if already shorter.
    pub fn clamp_magnitude(vector: Self, max_length: Fix64) -> Self {
        let magnitude = vector.magnitude();
        if magnitude > max_length {
            vector * (max_length / magnitude)
        } else {
            vector
        }
    }

    /// Linear interpolation. `t` is not clamped.
    pub fn lerp(a: Self, b: Self, t: Fix64) -> Self {
        a + (b - a) * t
    }

    pub fn lerp_unclamped(a: Self, b: Self, t: Fix64) -> Self {
        a + (b - a) * t
    }

    /// Component-wise maximum.
    pub fn max(lhs: Self, rhs: Self) -> Self {
        Self::new(lhs.x.max(rhs.x), lhs.y.max(rhs.y), lhs.z.max(rhs.z))
    }

    /// Component-wise minimum.
    pub fn min(lhs: Self, rhs: Self) -> Self {
        Self::new(lhs.x.min(rhs.x), lhs.y.min(rhs.y), lhs.z.min(rhs.z))
    }

    /// Component-wise product.
    pub fn scale(a: Self, b: Self) -> Self {
        Self::new(a.x * b.x, a.y * b.y, a.z * b.z)
    }

    /// Moves `current` toward `target` by at most `max_distance_delta`
    /// without overshooting.
    pub fn move_towards(current: Self, target: Self, max_distance_delta: Fix64) -> Self {
        let delta = target - current;
        let distance = delta.magnitude();
        if distance <= max_distance_delta || distance == Fix64::ZERO {
            return target;
        }
        current + delta / distance * max_distance_delta
    }

    /// Rotates `current` toward `target` by at most `max_radians_delta` while
    /// its length moves toward the target length by at most `max_magnitude_delta`.
    pub fn rotate_towards(
        current: Self,
        target: Self,
        max_radians_delta: Fix64,
        max_magnitude_delta: Fix64,
    ) -> Self {
        let from = current.normalized();
        let to = target.normalized();
        if from == Self::ZERO || to == Self::ZERO {
            return Self::move_towards(current, target, max_magnitude_delta);
        }

        let current_length = current.magnitude();
        let target_length = target.magnitude();
        let length = if (target_length - current_length).abs() <= max_magnitude_delta {
            target_length
        } else if target_length > current_length {
            current_length + max_magnitude_delta
        } else {
            current_length - max_magnitude_delta
        };

        let angle = Self::angle(from, to);
        let direction = if angle <= max_radians_delta {
            to
        } else {
            let mut axis = Self::cross(from, to);
            if axis.magnitude() < Self::K_EPSILON {
                // Opposite directions: any perpendicular axis works.
                axis = Self::cross(from, Self::UP);
                if axis.magnitude() < Self::K_EPSILON {
                    axis = Self::cross(from, Self::RIGHT);
                }
            }
            Quaternion::angle_axis(max_radians_delta, axis.normalized()) * from
        };

        direction * length
    }

    /// Projects `vector` onto the direction of `on_normal`.
    ///
    /// `on_normal` goes through the zero-safe [`Vector3::normalized`], so a
    /// zero-length normal projects everything to zero.
    pub fn project(vector: Self, on_normal: Self) -> Self {
        let normal = on_normal.normalized();
        normal * Self::dot(vector, normal)
    }

    /// Projects `vector` onto the plane through the origin with normal `plane_normal`.
    pub fn project_on_plane(vector: Self, plane_normal: Self) -> Self {
        vector - Self::project(vector, plane_normal)
    }

    /// Reflects `in_direction` off the plane defined by `in_normal`.
    pub fn reflect(in_direction: Self, in_normal: Self) -> Self {
        in_direction - Self::project(in_direction, in_normal) * Fix64::TWO
    }

    /// Normalizes `normal` and makes `tangent` orthogonal to it.
    pub fn ortho_normalize(normal: &mut Self, tangent: &mut Self) {
        normal.normalize();
        *tangent = (*tangent - *normal * Self::dot(*tangent, *normal)).normalized();
    }

    /// Gram-Schmidt over three vectors.
    pub fn ortho_normalize3(normal: &mut Self, tangent: &mut Self, binormal: &mut Self) {
        Self::ortho_normalize(normal, tangent);
        *binormal = (*binormal
            - *normal * Self::dot(*binormal, *normal)
            - *tangent * Self::dot(*binormal, *tangent))
        .normalized();
    }

    /// Lossy conversion for rendering.
    pub fn as_vec3(self) -> Vec3 {
        Vec3::new(self.x.to_f32(), self.y.to_f32(), self.z.to_f32())
    }
}

impl From<Vector3> for Vec3 {
    fn from(value: Vector3) -> Self {
        value.as_vec3()
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<Fix64> for Vector3 {
    type Output = Self;

    fn mul(self, d: Fix64) -> Self {
        Self::new(self.x * d, self.y * d, self.z * d)
    }
}

impl Mul<Vector3> for Fix64 {
    type Output = Vector3;

    fn mul(self, v: Vector3) -> Vector3 {
        v * self
    }
}

impl Div<Fix64> for Vector3 {
    type Output = Self;

    fn div(self, d: Fix64) -> Self {
        Self::new(self.x / d, self.y / d, self.z / d)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<Fix64> for Vector3 {
    fn mul_assign(&mut self, rhs: Fix64) {
        *self = *self * rhs;
    }
}

impl DivAssign<Fix64> for Vector3 {
    fn div_assign(&mut self, rhs: Fix64) {
        *self = *self / rhs;
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x: {} y: {} z: {}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn fx(value: f64) -> Fix64 {
        Fix64::from_f64(value)
    }

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(fx(x), fx(y), fx(z))
    }

    fn assert_close(actual: Vector3, expected: Vector3, eps: f64) {
        let diff = actual - expected;
        assert!(
            diff.x.abs().to_f64() < eps && diff.y.abs().to_f64() < eps && diff.z.abs().to_f64() < eps,
            "{actual} != {expected}"
        );
    }

    #[test]
    fn test_basic_operators() {
        let a = Vector3::from_ints(1, 2, 3);
        let b = Vector3::from_ints(4, -5, 6);

        assert_eq!(a + b, Vector3::from_ints(5, -3, 9));
        assert_eq!(a - b, Vector3::from_ints(-3, 7, -3));
        assert_eq!(-a, Vector3::from_ints(-1, -2, -3));
        assert_eq!(a * Fix64::TWO, Vector3::from_ints(2, 4, 6));
        assert_eq!(Fix64::TWO * a, a * Fix64::TWO);
        assert_eq!(Vector3::from_ints(2, 4, 6) / Fix64::TWO, a);
        assert_eq!(Vector3::dot(a, b), Fix64::from_int(12));
    }

    #[test]
    fn test_cross_is_right_handed() {
        assert_eq!(Vector3::cross(Vector3::RIGHT, Vector3::UP), Vector3::FORWARD);
        assert_eq!(Vector3::cross(Vector3::UP, Vector3::FORWARD), Vector3::RIGHT);
        assert_eq!(Vector3::cross(Vector3::FORWARD, Vector3::RIGHT), Vector3::UP);

        let a = Vector3::from_ints(1, 2, 3);
        let b = Vector3::from_ints(4, 5, 6);
        assert_eq!(Vector3::cross(a, b), Vector3::from_ints(-3, 6, -3));
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vector3::ZERO.normalized(), Vector3::ZERO);

        let mut tiny = v(1e-6, 0.0, 0.0);
        tiny.normalize();
        assert_eq!(tiny, v(1e-6, 0.0, 0.0));
        assert_eq!(tiny.normalized(), Vector3::ZERO);
    }

    #[test]
    fn test_magnitude() {
        let a = Vector3::from_ints(2, 3, 6);
        assert_eq!(a.sqr_magnitude(), Fix64::from_int(49));
        assert!((a.magnitude().to_f64() - 7.0).abs() < 1e-8);
        assert!((Vector3::distance(a, Vector3::ZERO).to_f64() - 7.0).abs() < 1e-8);
    }

    #[test]
    fn test_clamp_magnitude() {
        let a = Vector3::from_ints(0, 3, 4);
        assert_eq!(Vector3::clamp_magnitude(a, Fix64::from_int(10)), a);
        assert_close(Vector3::clamp_magnitude(a, Fix64::ONE), v(0.0, 0.6, 0.8), 1e-8);
    }

    #[test]
    fn test_lerp_is_unclamped() {
        let a = Vector3::ZERO;
        let b = Vector3::from_ints(10, 0, 0);

        assert_eq!(Vector3::lerp(a, b, Fix64::HALF), Vector3::from_ints(5, 0, 0));
        assert_eq!(Vector3::lerp(a, b, Fix64::TWO), Vector3::from_ints(20, 0, 0));
        assert_eq!(Vector3::lerp_unclamped(a, b, -Fix64::ONE), Vector3::from_ints(-10, 0, 0));
    }

    #[test]
    fn test_min_max() {
        let a = Vector3::from_ints(1, 5, -3);
        let b = Vector3::from_ints(2, -1, 0);
        assert_eq!(Vector3::min(a, b), Vector3::from_ints(1, -1, -3));
        assert_eq!(Vector3::max(a, b), Vector3::from_ints(2, 5, 0));
    }

    #[test]
    fn test_project_and_reflect() {
        let vector = Vector3::from_ints(3, 4, 0);

        assert_close(Vector3::project(vector, Vector3::from_ints(5, 0, 0)), v(3.0, 0.0, 0.0), 1e-8);
        assert_close(Vector3::project_on_plane(vector, Vector3::UP), v(3.0, 0.0, 0.0), 1e-8);
        assert_close(Vector3::reflect(Vector3::from_ints(1, -1, 0), Vector3::UP), v(1.0, 1.0, 0.0), 1e-8);

        // Zero normal goes through the zero-safe normalize.
        assert_eq!(Vector3::project(vector, Vector3::ZERO), Vector3::ZERO);
    }

    #[test]
    fn test_angle() {
        let angle = Vector3::angle(Vector3::RIGHT, Vector3::UP);
        assert!((angle.to_f64() - std::f64::consts::FRAC_PI_2).abs() < 1e-7);

        let signed = Vector3::signed_angle(Vector3::UP, Vector3::RIGHT, Vector3::FORWARD);
        assert!((signed.to_f64() + std::f64::consts::FRAC_PI_2).abs() < 1e-7);
    }

    #[test]
    fn test_move_towards_does_not_overshoot() {
        let target = Vector3::from_ints(10, 0, 0);
        assert_eq!(Vector3::move_towards(Vector3::ZERO, target, Fix64::from_int(4)), Vector3::from_ints(4, 0, 0));
        assert_eq!(Vector3::move_towards(Vector3::ZERO, target, Fix64::from_int(40)), target);
    }

    #[test]
    fn test_rotate_towards() {
        let quarter = Fix64::PI_OVER_2;
        let eighth = Fix64::from_f64(std::f64::consts::FRAC_PI_4);

        let full = Vector3::rotate_towards(Vector3::RIGHT, Vector3::UP, quarter, Fix64::ZERO);
        assert_close(full, Vector3::UP, 1e-6);

        let half = Vector3::rotate_towards(Vector3::RIGHT, Vector3::UP, eighth, Fix64::ZERO);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(half, v(s, s, 0.0), 1e-6);
    }

    #[test]
    fn test_scale_and_ortho_normalize() {
        assert_eq!(
            Vector3::scale(Vector3::from_ints(1, 2, 3), Vector3::from_ints(4, 5, 6)),
            Vector3::from_ints(4, 10, 18)
        );

        let mut normal = Vector3::from_ints(0, 2, 0);
        let mut tangent = Vector3::from_ints(1, 1, 0);
        let mut binormal = Vector3::from_ints(1, 1, 1);
        Vector3::ortho_normalize3(&mut normal, &mut tangent, &mut binormal);

        assert_close(normal, Vector3::UP, 1e-8);
        assert_close(tangent, Vector3::RIGHT, 1e-8);
        assert_close(binormal, Vector3::FORWARD, 1e-8);
    }

    #[test]
    fn test_display() {
        assert_eq!(Vector3::from_ints(1, -2, 0).to_string(), "x: 1 y: -2 z: 0");
    }

    proptest! {
        #[test]
        fn normalized_has_unit_magnitude(
            x in -1_000_000i64..1_000_000,
            y in -1_000_000i64..1_000_000,
            z in -1_000_000i64..1_000_000,
        ) {
            // Components in [-1000, 1000) with millesimal resolution.
            let vector = Vector3::new(
                Fix64::from_raw((x << 32) / 1000),
                Fix64::from_raw((y << 32) / 1000),
                Fix64::from_raw((z << 32) / 1000),
            );
            prop_assume!(vector.magnitude() > Fix64::from_ratio(1, 10));

            let magnitude = vector.normalized().magnitude().to_f64();
            prop_assert!((magnitude - 1.0).abs() < 1e-6, "magnitude {}", magnitude);
        }
    }
}
