use glam::{Mat4, Quat, Vec3};

/// Parent-relative placement of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// `T * R * S`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Move by `delta`, expressed in the entity's own axes when
    /// `relative_to_self`
    pub fn translate(&mut self, delta: Vec3, relative_to_self: bool) {
        if relative_to_self {
            self.position += self.rotation * delta;
        } else {
            self.position += delta;
        }
    }

    /// Post-multiply (own axes) or pre-multiply (parent axes) a rotation
    pub fn rotate(&mut self, delta: Quat, relative_to_self: bool) {
        self.rotation = if relative_to_self {
            self.rotation * delta
        } else {
            delta * self.rotation
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_translate_relative_to_self() {
        let mut transform = Transform::default().with_rotation(Quat::from_rotation_y(FRAC_PI_2));
        transform.translate(Vec3::X, true);
        assert!((transform.position - Vec3::new(0.0, 0.0, -1.0)).length() < 0.0001);

        transform.translate(Vec3::X, false);
        assert!((transform.position - Vec3::new(1.0, 0.0, -1.0)).length() < 0.0001);
    }

    #[test]
    fn test_rotate_order() {
        let a = Quat::from_rotation_x(0.3);
        let b = Quat::from_rotation_y(0.4);

        let mut local = Transform::default().with_rotation(a);
        local.rotate(b, true);
        assert!(local.rotation.dot(a * b).abs() > 0.9999);

        let mut parent = Transform::default().with_rotation(a);
        parent.rotate(b, false);
        assert!(parent.rotation.dot(b * a).abs() > 0.9999);
    }

    #[test]
    fn test_matrix() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let point = transform.matrix().transform_point3(Vec3::ZERO);
        assert!((point - Vec3::new(1.0, 2.0, 3.0)).length() < 0.0001);
    }
}
