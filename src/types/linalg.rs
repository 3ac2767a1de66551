//! Linear algebra type aliases for the reference-frame engine
//!
//! Rotations act on ROW vectors: a vector expressed in frame A is carried into
//! frame B by `v_B = v_A * R_A_B`, and rotations compose left to right,
//! `R_A_C = R_A_B * R_B_C`.

use nalgebra::{SMatrix, SVector};

// ===== Dimensions =====
pub const FRAME_DIM: usize = 3;

pub type Vec3 = SVector<f64, FRAME_DIM>;
pub type Mat3 = SMatrix<f64, FRAME_DIM, FRAME_DIM>;

// ===== Numerical guards =====

/// `inverse()` only trusts determinants in `(INVERSE_DET_MIN, INVERSE_DET_MAX]`.
pub const INVERSE_DET_MIN: f64 = 0.1;
pub const INVERSE_DET_MAX: f64 = 1.1;

/// `1 + trace` must exceed this before the quaternion formula divides by `4 * qw`.
pub const QUATERNION_EPSILON: f64 = 1e-7;
