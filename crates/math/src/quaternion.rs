//! Deterministic rotation quaternion over [`Fix64`].
//!
//! Components are stored as `(x, y, z, w)` with `w` the scalar part. Euler
//! angles are radians and compose in ZYX order (`q = qz * qy * qx`).

use std::fmt;
use std::ops::Mul;

use glam::Quat;
use serde::{Deserialize, Serialize};

use crate::fix64::Fix64;
use crate::vector3::Vector3;

/// Above this `|cos|` the interpolators fall back to linear weights.
const SLERP_LINEAR_THRESHOLD: Fix64 = Fix64::from_raw(4_292_819_812);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: Fix64,
    pub y: Fix64,
    pub z: Fix64,
    pub w: Fix64,
}

impl Quaternion {
    /// 1e-6, margin below `0.5` for the gimbal-lock test in [`Quaternion::euler_angles`].
    pub const K_EPSILON: Fix64 = Fix64::from_raw(4_295);
    pub const K_THRESHOLD: Fix64 = Fix64::from_raw(Fix64::HALF.raw() - Self::K_EPSILON.raw());

    /// All-zero sentinel. Existing gameplay data compares against this value,
    /// so it is *not* the multiplicative identity; use [`Quaternion::NO_ROTATION`]
    /// when a rotation is needed.
    pub const IDENTITY: Self = Self::new(Fix64::ZERO, Fix64::ZERO, Fix64::ZERO, Fix64::ZERO);

    /// The multiplicative identity `(0, 0, 0, 1)`.
    pub const NO_ROTATION: Self = Self::new(Fix64::ZERO, Fix64::ZERO, Fix64::ZERO, Fix64::ONE);

    #[inline]
    pub const fn new(x: Fix64, y: Fix64, z: Fix64, w: Fix64) -> Self {
        Self { x, y, z, w }
    }

    /// Pure quaternion `(v, 0)`.
    pub const fn from_vector(v: Vector3) -> Self {
        Self::new(v.x, v.y, v.z, Fix64::ZERO)
    }

    pub fn set(&mut self, x: Fix64, y: Fix64, z: Fix64, w: Fix64) {
        *self = Self::new(x, y, z, w);
    }

    #[inline]
    pub fn norm2(self) -> Fix64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Unit-length copy. A zero quaternion stays zero.
    pub fn normalized(self) -> Self {
        let length_inv = Fix64::ONE / self.norm2().sqrt();
        Self::new(
            self.x * length_inv,
            self.y * length_inv,
            self.z * length_inv,
            self.w * length_inv,
        )
    }

    pub fn normalize(&mut self) {
        *self = self.normalized();
    }

    /// Rotation of `angle` radians about `axis`. `axis` must be unit length.
    pub fn angle_axis(angle: Fix64, axis: Vector3) -> Self {
        let half = angle * Fix64::HALF;
        let sin_half = half.sin();
        Self::new(sin_half * axis.x, sin_half * axis.y, sin_half * axis.z, half.cos())
    }

    /// Inverse of [`Quaternion::angle_axis`] for a unit quaternion.
    ///
    /// Not guarded: with no rotation `sin(angle)` is zero and the axis
    /// components saturate.
    pub fn to_angle_axis(self) -> (Fix64, Vector3) {
        let angle = self.w.acos();
        let sin_inv = Fix64::ONE / angle.sin();
        let axis = Vector3::new(self.x * sin_inv, self.y * sin_inv, self.z * sin_inv);
        (angle * Fix64::TWO, axis)
    }

    /// Rotation from Euler angles `(x, y, z)` in radians, composed `qz * qy * qx`.
    pub fn euler(euler: Vector3) -> Self {
        Self::euler_xyz(euler.x, euler.y, euler.z)
    }

    pub fn euler_xyz(x: Fix64, y: Fix64, z: Fix64) -> Self {
        let (sx, cx) = ((x * Fix64::HALF).sin(), (x * Fix64::HALF).cos());
        let (sy, cy) = ((y * Fix64::HALF).sin(), (y * Fix64::HALF).cos());
        let (sz, cz) = ((z * Fix64::HALF).sin(), (z * Fix64::HALF).cos());

        Self::new(
            cz * cy * sx - sz * sy * cx,
            cz * sy * cx + sz * cy * sx,
            sz * cy * cx - cz * sy * sx,
            cz * cy * cx + sz * sy * sx,
        )
    }

    /// Euler angles `(x, y, z)` reproducing this rotation through [`Quaternion::euler`].
    ///
    /// Near a pitch of +-PI/2 roll and yaw are no longer independent; the roll
    /// is reported as zero and folded into the yaw.
    pub fn euler_angles(self) -> Vector3 {
        let Self { x, y, z, w } = self;
        let test = w * y - x * z;

        if test < -Self::K_THRESHOLD || test > Self::K_THRESHOLD {
            let sign = test.sign();
            return Vector3::new(
                Fix64::ZERO,
                sign * Fix64::PI_OVER_2,
                -Fix64::TWO * sign * Fix64::atan2(x, w),
            );
        }

        let r11 = Fix64::TWO * (x * y + w * z);
        let r12 = w * w + x * x - y * y - z * z;
        let r21 = -Fix64::TWO * (x * z - w * y);
        let r31 = Fix64::TWO * (y * z + w * x);
        let r32 = w * w - x * x - y * y + z * z;

        Vector3::new(Fix64::atan2(r31, r32), r21.asin(), Fix64::atan2(r11, r12))
    }

    pub fn set_euler_angles(&mut self, euler: Vector3) {
        *self = Self::euler(euler);
    }

    /// Shortest rotation taking `from` to `to`.
    pub fn from_to_rotation(from: Vector3, to: Vector3) -> Self {
        let axis = Vector3::cross(from, to).normalized();
        if axis == Vector3::ZERO {
            if Vector3::dot(from, to) >= Fix64::ZERO {
                return Self::NO_ROTATION;
            }
            // Opposite directions: half turn about any perpendicular.
            let mut perpendicular = Vector3::cross(from, Vector3::UP).normalized();
            if perpendicular == Vector3::ZERO {
                perpendicular = Vector3::cross(from, Vector3::RIGHT).normalized();
            }
            return Self::angle_axis(Fix64::PI, perpendicular);
        }
        Self::angle_axis(Vector3::angle(from, to), axis)
    }

    #[inline]
    pub fn dot(a: Self, b: Self) -> Fix64 {
        a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w
    }

    /// General inverse, `conjugate / norm2`.
    pub fn inverse(rotation: Self) -> Self {
        let norm2_inv = Fix64::ONE / rotation.norm2();
        Self::new(
            -rotation.x * norm2_inv,
            -rotation.y * norm2_inv,
            -rotation.z * norm2_inv,
            rotation.w * norm2_inv,
        )
    }

    pub fn conjugate(rotation: Self) -> Self {
        Self::new(-rotation.x, -rotation.y, -rotation.z, rotation.w)
    }

    /// Inverse of a unit quaternion (its conjugate).
    pub fn unit_inverse(rotation: Self) -> Self {
        Self::conjugate(rotation)
    }

    /// Spherical interpolation with `t` clamped to `[0, 1]`.
    pub fn lerp(a: Self, b: Self, t: Fix64) -> Self {
        Self::interpolate(a, b, t.clamp01())
    }

    pub fn lerp_unclamped(a: Self, b: Self, t: Fix64) -> Self {
        Self::interpolate(a, b, t)
    }

    /// Spherical interpolation with `t` clamped to `[0, 1]`.
    pub fn slerp(a: Self, b: Self, t: Fix64) -> Self {
        Self::interpolate(a, b, t.clamp01())
    }

    pub fn slerp_unclamped(a: Self, b: Self, t: Fix64) -> Self {
        Self::interpolate(a, b, t)
    }

    /// Shared body of the interpolators. Both inputs are normalized and `b`
    /// is negated when needed so the shorter arc is taken.
    fn interpolate(a: Self, b: Self, t: Fix64) -> Self {
        let a = a.normalized();
        let mut b = b.normalized();

        let mut cosa = Self::dot(a, b);
        if cosa < Fix64::ZERO {
            b = Self::new(-b.x, -b.y, -b.z, -b.w);
            cosa = -cosa;
        }

        let (k0, k1) = if cosa > SLERP_LINEAR_THRESHOLD {
            (Fix64::ONE - t, t)
        } else {
            let sina = (Fix64::ONE - cosa * cosa).sqrt();
            let theta = Fix64::atan2(sina, cosa);
            (((Fix64::ONE - t) * theta).sin() / sina, (t * theta).sin() / sina)
        };

        Self::new(
            a.x * k0 + b.x * k1,
            a.y * k0 + b.y * k1,
            a.z * k0 + b.z * k1,
            a.w * k0 + b.w * k1,
        )
    }

    /// Lossy conversion for rendering.
    pub fn as_quat(self) -> Quat {
        Quat::from_xyzw(self.x.to_f32(), self.y.to_f32(), self.z.to_f32(), self.w.to_f32())
    }
}

impl From<Quaternion> for Quat {
    fn from(value: Quaternion) -> Self {
        value.as_quat()
    }
}

/// Hamilton product, factored to eight multiplies.
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let lhs = self;

        let prd_0 = (lhs.z - lhs.y) * (rhs.y - rhs.z);
        let prd_1 = (lhs.w + lhs.x) * (rhs.w + rhs.x);
        let prd_2 = (lhs.w - lhs.x) * (rhs.y + rhs.z);
        let prd_3 = (lhs.y + lhs.z) * (rhs.w - rhs.x);
        let prd_4 = (lhs.z - lhs.x) * (rhs.x - rhs.y);
        let prd_5 = (lhs.z + lhs.x) * (rhs.x + rhs.y);
        let prd_6 = (lhs.w + lhs.y) * (rhs.w - rhs.z);
        let prd_7 = (lhs.w - lhs.y) * (rhs.w + rhs.z);

        let prd_8 = prd_5 + prd_6 + prd_7;
        let prd_9 = (prd_4 + prd_8) * Fix64::HALF;

        Self::new(
            prd_1 + prd_9 - prd_8,
            prd_2 + prd_9 - prd_7,
            prd_3 + prd_9 - prd_6,
            prd_0 + prd_9 - prd_5,
        )
    }
}

/// Rotates a point: `q * (v, 0) * inverse(q)`.
impl Mul<Vector3> for Quaternion {
    type Output = Vector3;

    fn mul(self, point: Vector3) -> Vector3 {
        let end = self * Quaternion::from_vector(point) * Quaternion::inverse(self);
        Vector3::new(end.x, end.y, end.z)
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x: {} y: {} z: {} w: {}", self.x, self.y, self.z, self.w)
    }
}
