//! 3×3 rotation matrix algebra for device / earth / vehicle frames
//!
//! Convention (fixed for the whole crate): vectors are ROW vectors.
//! `R_A_B` carries a vector from frame A into frame B as `v_B = v_A * R_A_B`,
//! so a chain of frames composes left to right: `R_A_C = R_A_B * R_B_C`.
//! The device-to-vehicle rotation is therefore `R_device_earth * R_ground_vehicle`.

use std::ops::Mul;

use nalgebra::{Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::types::{Mat3, Vec3, INVERSE_DET_MAX, INVERSE_DET_MIN, QUATERNION_EPSILON};

/// Unit quaternion `(x, y, z, w)` derived on demand from a [`RotationMatrix`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(self.w, self.x, self.y, self.z))
    }
}

impl From<UnitQuaternion<f64>> for Quaternion {
    fn from(q: UnitQuaternion<f64>) -> Self {
        // nalgebra stores [i, j, k, w]
        let c = q.quaternion().coords;
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// Outcome of refreshing a cached orientation from a rotation matrix.
///
/// When `1 + trace` is too small the closed-form extraction would divide by
/// ~0, so `updated` is false and `value` is the previous orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuaternionUpdate {
    pub updated: bool,
    pub value: Quaternion,
}

/// Orthonormal 3×3 basis change.
///
/// Value type: every consumer gets its own copy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationMatrix {
    m: Mat3,
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl RotationMatrix {
    pub fn identity() -> Self {
        Self {
            m: Mat3::identity(),
        }
    }

    /// Build from entries in row-major order, `mRC` = row R, column C.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        m11: f64,
        m12: f64,
        m13: f64,
        m21: f64,
        m22: f64,
        m23: f64,
        m31: f64,
        m32: f64,
        m33: f64,
    ) -> Self {
        Self {
            m: Mat3::new(m11, m12, m13, m21, m22, m23, m31, m32, m33),
        }
    }

    #[rustfmt::skip]
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self::new(
            rows[0][0], rows[0][1], rows[0][2],
            rows[1][0], rows[1][1], rows[1][2],
            rows[2][0], rows[2][1], rows[2][2],
        )
    }

    pub fn from_matrix(m: Mat3) -> Self {
        Self { m }
    }

    pub fn matrix(&self) -> &Mat3 {
        &self.m
    }

    /// Zero-based entry access
    pub fn entry(&self, row: usize, col: usize) -> f64 {
        self.m[(row, col)]
    }

    pub fn as_rows(&self) -> [[f64; 3]; 3] {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.m[(r, c)];
            }
        }
        rows
    }

    /// Standard matrix product `self * rhs`
    pub fn multiply(&self, rhs: &RotationMatrix) -> RotationMatrix {
        Self { m: self.m * rhs.m }
    }

    pub fn transpose(&self) -> RotationMatrix {
        Self {
            m: self.m.transpose(),
        }
    }

    /// Cofactor expansion along the first row
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
            - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
            + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
    }

    /// Classical adjugate (transpose of the cofactor matrix)
    #[rustfmt::skip]
    pub fn adjugate(&self) -> RotationMatrix {
        let m = &self.m;
        let (m11, m12, m13) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let (m21, m22, m23) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
        let (m31, m32, m33) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);

        Self::new(
            m22 * m33 - m23 * m32, m13 * m32 - m12 * m33, m12 * m23 - m13 * m22,
            m23 * m31 - m21 * m33, m11 * m33 - m13 * m31, m13 * m21 - m11 * m23,
            m21 * m32 - m22 * m31, m12 * m31 - m11 * m32, m11 * m22 - m12 * m21,
        )
    }

    /// Adjugate over determinant, clamped to identity for degenerate input.
    ///
    /// Only determinants in `(0.1, 1.1]` are trusted. Anything else (singular,
    /// reflected, scaled, NaN) yields `identity()` rather than a garbage inverse.
    pub fn inverse(&self) -> RotationMatrix {
        let det = self.determinant();
        if det > INVERSE_DET_MIN && det <= INVERSE_DET_MAX {
            Self {
                m: self.adjugate().m / det,
            }
        } else {
            log::warn!(
                "Rotation inverse clamped to identity (determinant {:.6} outside ({}, {}])",
                det,
                INVERSE_DET_MIN,
                INVERSE_DET_MAX
            );
            Self::identity()
        }
    }

    #[rustfmt::skip]
    pub fn rotate_x(rad: f64) -> RotationMatrix {
        let (s, c) = rad.sin_cos();
        Self::new(
            1.0, 0.0, 0.0,
            0.0, c, -s,
            0.0, s, c,
        )
    }

    #[rustfmt::skip]
    pub fn rotate_y(rad: f64) -> RotationMatrix {
        let (s, c) = rad.sin_cos();
        Self::new(
            c, 0.0, s,
            0.0, 1.0, 0.0,
            -s, 0.0, c,
        )
    }

    #[rustfmt::skip]
    pub fn rotate_z(rad: f64) -> RotationMatrix {
        let (s, c) = rad.sin_cos();
        Self::new(
            c, -s, 0.0,
            s, c, 0.0,
            0.0, 0.0, 1.0,
        )
    }

    /// Body → world rotation for column vectors from roll / pitch / yaw
    /// (radians): `Rz(yaw) * Ry(pitch) * Rx(roll)`
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> RotationMatrix {
        Self::rotate_z(yaw) * Self::rotate_y(pitch) * Self::rotate_x(roll)
    }

    /// Device → earth attitude for row vectors from roll / pitch / yaw, so
    /// that `v_earth = v_device * R`. This is the transpose of [`from_euler`].
    ///
    /// [`from_euler`]: RotationMatrix::from_euler
    pub fn attitude_from_euler(roll: f64, pitch: f64, yaw: f64) -> RotationMatrix {
        Self::from_euler(roll, pitch, yaw).transpose()
    }

    /// Rotation matrix of a quaternion. Zero quaternions map to identity.
    pub fn from_quaternion(q: &Quaternion) -> RotationMatrix {
        let norm = q.norm();
        if !norm.is_finite() || norm < QUATERNION_EPSILON {
            return Self::identity();
        }
        let (x, y, z, w) = (q.x / norm, q.y / norm, q.z / norm, q.w / norm);

        Self::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        )
    }

    /// Closed-form quaternion extraction; `None` when `1 + trace <= 1e-7`.
    pub fn to_quaternion(&self) -> Option<Quaternion> {
        let m = &self.m;
        let arg = 1.0 + m[(0, 0)] + m[(1, 1)] + m[(2, 2)];
        if arg.is_nan() || arg <= QUATERNION_EPSILON {
            return None;
        }

        let qw = arg.sqrt() / 2.0;
        let denom = 4.0 * qw;
        Some(Quaternion {
            x: (m[(2, 1)] - m[(1, 2)]) / denom,
            y: (m[(0, 2)] - m[(2, 0)]) / denom,
            z: (m[(1, 0)] - m[(0, 1)]) / denom,
            w: qw,
        })
    }

    /// Refresh a cached orientation, keeping `previous` on the degenerate branch
    pub fn update_quaternion(&self, previous: Quaternion) -> QuaternionUpdate {
        match self.to_quaternion() {
            Some(value) => QuaternionUpdate {
                updated: true,
                value,
            },
            None => {
                log::warn!("Quaternion update skipped: 1 + trace below {}", QUATERNION_EPSILON);
                QuaternionUpdate {
                    updated: false,
                    value: previous,
                }
            }
        }
    }

    /// Robust extraction that also handles half-turn rotations (trace near -1).
    ///
    /// Assumes the matrix is a proper rotation.
    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.m))
    }

    /// Apply the row-vector convention: returns `v * self`
    pub fn transform(&self, v: &Vec3) -> Vec3 {
        self.m.transpose() * v
    }

    /// Largest absolute deviation of `self * selfᵀ` from identity
    pub fn orthonormality_error(&self) -> f64 {
        (self.m * self.m.transpose() - Mat3::identity()).abs().max()
    }
}

impl Mul for RotationMatrix {
    type Output = RotationMatrix;

    fn mul(self, rhs: RotationMatrix) -> RotationMatrix {
        self.multiply(&rhs)
    }
}

impl<'a> Mul<&'a RotationMatrix> for &'a RotationMatrix {
    type Output = RotationMatrix;

    fn mul(self, rhs: &'a RotationMatrix) -> RotationMatrix {
        self.multiply(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn sample_attitudes() -> Vec<RotationMatrix> {
        vec![
            RotationMatrix::identity(),
            RotationMatrix::rotate_x(0.3),
            RotationMatrix::rotate_y(-1.2),
            RotationMatrix::rotate_z(2.9),
            RotationMatrix::from_euler(0.1, -0.4, 1.7),
            RotationMatrix::from_euler(-2.0, 1.1, -3.0),
        ]
    }

    #[test]
    fn test_identity_basics() {
        let i = RotationMatrix::identity();
        assert_eq!(i.determinant(), 1.0);
        assert_eq!(i.inverse(), i);
        assert_eq!(i.transpose(), i);
        assert_eq!(i.orthonormality_error(), 0.0);
    }

    #[test]
    fn test_multiply_by_inverse_is_identity() {
        for a in sample_attitudes() {
            let product = a * a.inverse();
            assert_abs_diff_eq!(*product.matrix(), Mat3::identity(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse_matches_transpose_for_rotations() {
        for a in sample_attitudes() {
            assert_abs_diff_eq!(*a.inverse().matrix(), *a.transpose().matrix(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse_of_scaled_matrix_clamps_to_identity() {
        // det = 5.0
        let scale = 5.0_f64.cbrt();
        let scaled = RotationMatrix::from_matrix(RotationMatrix::rotate_z(0.7).matrix() * scale);
        assert_relative_eq!(scaled.determinant(), 5.0, epsilon = 1e-9);
        assert_eq!(scaled.inverse(), RotationMatrix::identity());
    }

    #[test]
    fn test_inverse_rejects_singular_and_reflected() {
        let singular = RotationMatrix::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert_eq!(singular.determinant(), 0.0);
        assert_eq!(singular.inverse(), RotationMatrix::identity());

        let reflection = RotationMatrix::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        assert_eq!(reflection.inverse(), RotationMatrix::identity());

        let nan = RotationMatrix::new(f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(nan.inverse(), RotationMatrix::identity());
    }

    #[test]
    fn test_inverse_bounds_are_half_open() {
        // det exactly 1.1 is accepted, exactly 0.1 is not
        let upper = RotationMatrix::new(1.1, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let inv = upper.inverse();
        assert_relative_eq!(inv.entry(0, 0), 1.0 / 1.1, epsilon = 1e-12);

        let lower = RotationMatrix::new(0.1, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(lower.inverse(), RotationMatrix::identity());
    }

    #[test]
    fn test_slightly_scaled_matrix_still_inverts() {
        let scale = 1.05_f64.cbrt();
        let a = RotationMatrix::from_matrix(RotationMatrix::from_euler(0.2, 0.3, 0.4).matrix() * scale);
        let product = a * a.inverse();
        assert_abs_diff_eq!(*product.matrix(), Mat3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_z_zero_and_half_turns() {
        assert_eq!(RotationMatrix::rotate_z(0.0), RotationMatrix::identity());
        assert_eq!(RotationMatrix::rotate_x(0.0), RotationMatrix::identity());
        assert_eq!(RotationMatrix::rotate_y(0.0), RotationMatrix::identity());

        let full = RotationMatrix::rotate_z(PI) * RotationMatrix::rotate_z(PI);
        assert_abs_diff_eq!(*full.matrix(), Mat3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_axis_rotations_compose_additively() {
        let a = RotationMatrix::rotate_x(0.4) * RotationMatrix::rotate_x(0.5);
        assert_abs_diff_eq!(*a.matrix(), *RotationMatrix::rotate_x(0.9).matrix(), epsilon = 1e-12);

        let b = RotationMatrix::rotate_y(-0.4) * RotationMatrix::rotate_y(1.5);
        assert_abs_diff_eq!(*b.matrix(), *RotationMatrix::rotate_y(1.1).matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_composition_stays_proper() {
        let mut acc = RotationMatrix::identity();
        for a in sample_attitudes().iter().cycle().take(60) {
            acc = acc * *a;
        }
        assert_relative_eq!(acc.determinant(), 1.0, epsilon = 1e-9);
        assert!(acc.orthonormality_error() < 1e-9);
    }

    #[test]
    fn test_from_euler_matches_nalgebra() {
        let (roll, pitch, yaw) = (0.3, -0.7, 2.2);
        let ours = RotationMatrix::from_euler(roll, pitch, yaw);
        let theirs = Rotation3::from_euler_angles(roll, pitch, yaw);
        assert_abs_diff_eq!(*ours.matrix(), *theirs.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_attitude_from_euler_maps_device_to_earth() {
        // Flat device yawed a quarter turn left: its x axis points north (+y)
        let att = RotationMatrix::attitude_from_euler(0.0, 0.0, FRAC_PI_2);
        assert_abs_diff_eq!(att.transform(&Vec3::x()), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(att.transform(&Vec3::y()), Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);

        // Same mapping as nalgebra's body -> world rotation acting on column vectors
        let (roll, pitch, yaw) = (0.4, -0.25, 1.9);
        let att = RotationMatrix::attitude_from_euler(roll, pitch, yaw);
        let body_to_world = Rotation3::from_euler_angles(roll, pitch, yaw);
        for v in [Vec3::x(), Vec3::y(), Vec3::z(), Vec3::new(0.7, -1.2, 9.81)] {
            assert_abs_diff_eq!(att.transform(&v), body_to_world * v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_row_vector_convention() {
        // v * Rz(pi/2): x axis lands on -y
        let r = RotationMatrix::rotate_z(FRAC_PI_2);
        let v = r.transform(&Vec3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(v, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-12);

        // composition order matches chained transforms
        let a = RotationMatrix::from_euler(0.2, 0.1, -0.5);
        let b = RotationMatrix::rotate_z(1.3);
        let v = Vec3::new(0.3, -2.0, 9.8);
        assert_abs_diff_eq!((a * b).transform(&v), b.transform(&a.transform(&v)), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_quaternion() {
        let q = RotationMatrix::identity().to_quaternion().unwrap();
        assert_eq!(q, Quaternion::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_quaternion_about_z() {
        let q = RotationMatrix::rotate_z(FRAC_PI_2).to_quaternion().unwrap();
        let half = FRAC_PI_4;
        assert_relative_eq!(q.w, half.cos(), epsilon = 1e-12);
        assert_relative_eq!(q.z, half.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(q.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quaternion_round_trip() {
        for a in sample_attitudes() {
            if let Some(q) = a.to_quaternion() {
                assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-9);
                let back = RotationMatrix::from_quaternion(&q);
                assert_abs_diff_eq!(*back.matrix(), *a.matrix(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_half_turn_quaternion_is_skipped() {
        let half_turn = RotationMatrix::rotate_x(PI);
        assert!(half_turn.to_quaternion().is_none());

        let previous = Quaternion::new(0.1, 0.2, 0.3, 0.927);
        let update = half_turn.update_quaternion(previous);
        assert!(!update.updated);
        assert_eq!(update.value, previous);

        let update = RotationMatrix::identity().update_quaternion(previous);
        assert!(update.updated);
        assert_eq!(update.value, Quaternion::identity());
    }

    #[test]
    fn test_unit_quaternion_handles_half_turn() {
        let q: Quaternion = RotationMatrix::rotate_x(PI).to_unit_quaternion().into();
        assert_relative_eq!(q.x.abs(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.w, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unit_quaternion_agrees_with_closed_form() {
        let a = RotationMatrix::from_euler(0.4, -0.2, 1.0);
        let closed = a.to_quaternion().unwrap();
        let robust: Quaternion = a.to_unit_quaternion().into();
        let sign = if robust.w * closed.w < 0.0 { -1.0 } else { 1.0 };
        assert_relative_eq!(closed.x, sign * robust.x, epsilon = 1e-9);
        assert_relative_eq!(closed.y, sign * robust.y, epsilon = 1e-9);
        assert_relative_eq!(closed.z, sign * robust.z, epsilon = 1e-9);
        assert_relative_eq!(closed.w, sign * robust.w, epsilon = 1e-9);

        let back = closed.to_unit_quaternion().to_rotation_matrix();
        assert_abs_diff_eq!(*back.matrix(), *a.matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_quaternion_maps_to_identity() {
        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(RotationMatrix::from_quaternion(&zero), RotationMatrix::identity());
    }

    #[test]
    fn test_rows_round_trip() {
        let a = RotationMatrix::from_euler(0.5, 0.6, 0.7);
        assert_eq!(RotationMatrix::from_rows(a.as_rows()), a);
        assert_eq!(a.entry(1, 2), a.as_rows()[1][2]);
    }
}
