//! Rigid3: 6-DOF rigid body transformation (rotation + translation).
//!
//! Transforms points as: p' = R * p + t
//!
//! We use the notation `T_target_source`: `T_tracking_cam` maps a point
//! expressed in the camera frame into the tracking frame.

use std::ops::Mul;

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};

/// Interpolations below this angular separation fall back to the start rotation.
const SLERP_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rigid3 {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Rigid3 {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            translation,
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation,
        }
    }

    /// Construct from a w-first quaternion and a translation.
    ///
    /// The quaternion is normalized, so slightly denormalized inputs from CSV
    /// files are accepted.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz));
        Self {
            translation,
            rotation,
        }
    }

    /// Construct from a homogeneous 4x4 matrix of form [R | t; 0 | 1].
    pub fn from_matrix(mat: Matrix4<f64>) -> Self {
        let r: Matrix3<f64> = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        // Calibration matrices are rarely exactly orthonormal.
        let rot3 = Rotation3::from_matrix(&r);
        Self {
            translation,
            rotation: UnitQuaternion::from_rotation_matrix(&rot3),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.to_isometry().to_homogeneous()
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    /// self ∘ other: apply `other` first, then `self`.
    pub fn compose(&self, other: &Rigid3) -> Self {
        Self {
            translation: self.rotation * other.translation + self.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// T^{-1} = [R^T | -R^T t]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Interpolates between `start` (factor 0) and `end` (factor 1).
    ///
    /// Translation is linear, rotation follows the shortest slerp arc.
    pub fn interpolate(start: &Rigid3, end: &Rigid3, factor: f64) -> Self {
        let translation = start.translation.lerp(&end.translation, factor);
        let rotation = start
            .rotation
            .try_slerp(&end.rotation, factor, SLERP_EPSILON)
            .unwrap_or(start.rotation);
        Self {
            translation,
            rotation,
        }
    }

    pub fn has_nan(&self) -> bool {
        self.translation.iter().any(|v| v.is_nan())
            || self.rotation.coords.iter().any(|v| v.is_nan())
    }
}

impl Default for Rigid3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Rigid3 {
    type Output = Rigid3;

    fn mul(self, rhs: Rigid3) -> Rigid3 {
        self.compose(&rhs)
    }
}

impl Mul<&Rigid3> for &Rigid3 {
    type Output = Rigid3;

    fn mul(self, rhs: &Rigid3) -> Rigid3 {
        self.compose(rhs)
    }
}

impl From<Isometry3<f64>> for Rigid3 {
    fn from(iso: Isometry3<f64>) -> Self {
        Self {
            translation: iso.translation.vector,
            rotation: iso.rotation,
        }
    }
}

impl From<Rigid3> for Isometry3<f64> {
    fn from(rigid: Rigid3) -> Self {
        rigid.to_isometry()
    }
}
