//! Transform helpers shared by the sampler, the matrix builder and root motion
//!
//! Everything here is built on `glam`. Matrices are column-major and composed
//! as `translation * rotation * scale`.

use glam::{Mat4, Quat, Vec3};

/// Decomposed translation / rotation / scale triple
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Trs {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Compose into `T * R * S`
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose a matrix, see [`decompose_trs`]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        decompose_trs(matrix)
    }
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Split an affine matrix into translation, rotation and scale
///
/// Translation is the fourth column. Scale is the length of each basis
/// column; a zero-length axis reports a scale of 1 so later divisions stay
/// finite. Rotation is the closest quaternion to the normalized basis,
/// picked through the trace or the largest diagonal element, then
/// normalized.
pub fn decompose_trs(matrix: &Mat4) -> Trs {
    let translation = matrix.w_axis.truncate();

    let col0 = matrix.x_axis.truncate();
    let col1 = matrix.y_axis.truncate();
    let col2 = matrix.z_axis.truncate();

    let mut scale = Vec3::new(col0.length(), col1.length(), col2.length());
    if scale.x == 0.0 {
        scale.x = 1.0;
    }
    if scale.y == 0.0 {
        scale.y = 1.0;
    }
    if scale.z == 0.0 {
        scale.z = 1.0;
    }

    let r0 = col0 / scale.x;
    let r1 = col1 / scale.y;
    let r2 = col2 / scale.z;

    let (m00, m01, m02) = (r0.x, r1.x, r2.x);
    let (m10, m11, m12) = (r0.y, r1.y, r2.y);
    let (m20, m21, m22) = (r0.z, r1.z, r2.z);

    let trace = m00 + m11 + m22;
    let rotation = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        Quat::from_xyzw((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        Quat::from_xyzw(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        Quat::from_xyzw((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        Quat::from_xyzw((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
    };

    Trs {
        translation,
        rotation: normalize_or_identity(rotation),
        scale,
    }
}

/// Normalize a quaternion, falling back to identity for degenerate input
pub fn normalize_or_identity(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if len_sq > f32::EPSILON && len_sq.is_finite() {
        q * len_sq.sqrt().recip()
    } else {
        Quat::IDENTITY
    }
}

/// Trait for keyframe values that can be interpolated
///
/// Vectors interpolate linearly, rotations spherically along the shortest
/// arc.
pub trait Interpolate: Copy {
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Vec3 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.lerp(*other, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.slerp(*other, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_quat_eq(a: Quat, b: Quat) {
        // q and -q are the same rotation
        assert!(a.dot(b).abs() > 0.9999, "{a:?} != {b:?}");
    }

    #[test]
    fn test_decompose_identity() {
        let trs = decompose_trs(&Mat4::IDENTITY);
        assert_eq!(trs, Trs::IDENTITY);
    }

    #[test]
    fn test_decompose_translation_rotation_scale() {
        let rotation = Quat::from_rotation_y(0.7);
        let source = Trs::new(Vec3::new(1.0, -2.0, 3.5), rotation, Vec3::new(2.0, 0.5, 1.5));
        let trs = decompose_trs(&source.to_matrix());

        assert!((trs.translation - source.translation).length() < 0.0001);
        assert!((trs.scale - source.scale).length() < 0.0001);
        assert_quat_eq(trs.rotation, rotation);
    }

    #[test]
    fn test_decompose_all_branches() {
        // Half turns have a non-positive trace and exercise the diagonal branches
        for rotation in [
            Quat::from_rotation_x(std::f32::consts::PI),
            Quat::from_rotation_y(std::f32::consts::PI),
            Quat::from_rotation_z(std::f32::consts::PI),
            Quat::from_rotation_z(FRAC_PI_2),
        ] {
            let trs = decompose_trs(&Mat4::from_quat(rotation));
            assert_quat_eq(trs.rotation, rotation);
            assert!((trs.rotation.length() - 1.0).abs() < 0.0001);
        }
    }

    #[test]
    fn test_decompose_zero_scale_axis() {
        let matrix = Mat4::from_scale(Vec3::new(0.0, 2.0, 1.0));
        let trs = decompose_trs(&matrix);
        assert_eq!(trs.scale.x, 1.0);
        assert!((trs.scale.y - 2.0).abs() < 0.0001);
        assert!(trs.rotation.is_finite());
    }

    #[test]
    fn test_interpolate_vec3() {
        let a = Vec3::ZERO;
        let b = Vec3::new(2.0, 4.0, -6.0);
        let mid = a.interpolate(&b, 0.5);
        assert!((mid - Vec3::new(1.0, 2.0, -3.0)).length() < 0.0001);
    }

    #[test]
    fn test_interpolate_quat_shortest_path() {
        let a = Quat::from_rotation_z(0.2);
        let b = -Quat::from_rotation_z(0.6);
        let mid = a.interpolate(&b, 0.5);
        assert_quat_eq(mid, Quat::from_rotation_z(0.4));
    }

    #[test]
    fn test_normalize_or_identity_degenerate() {
        assert_eq!(normalize_or_identity(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)), Quat::IDENTITY);
    }
}
