//! Lockstep Math - Deterministic Fixed-Point Geometry
//!
//! Scalar, vector and quaternion types whose every operation is integer
//! arithmetic, so peers running the same frames end up with bit-identical
//! positions and rotations.
//!
//! # Determinism Rules
//!
//! 1. Simulation state uses [`Fix64`], never `f32`/`f64`
//! 2. Float constructors are for tuning constants; float conversions are for rendering
//! 3. No operation panics: overflow and division by zero saturate

pub mod fix64;
pub mod quaternion;
pub mod vector3;

pub use fix64::Fix64;
pub use quaternion::Quaternion;
pub use vector3::Vector3;
