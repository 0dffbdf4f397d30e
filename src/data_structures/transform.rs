//! Flat per-object transforms.
//!
//! A [`Transform`] is a position plus three independent axis rotations in
//! degrees. The composition order is fixed: rotate about X (roll), then Y
//! (pitch), then Z (yaw), then translate. [`Transform::to_matrix`] is the only
//! place that order is spelled out, and the draw path calls nothing else.
//!
//! Roll and pitch turn counter-clockwise about their axis. Yaw turns
//! clockwise seen from +Z, so a positive yaw sends +X towards -Y.

use cgmath::{Deg, Matrix4, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Rotation about the X axis, degrees.
    pub roll: f32,
    /// Rotation about the Y axis, degrees.
    pub pitch: f32,
    /// Rotation about the Z axis, degrees.
    pub yaw: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// Identity transform: at the origin, no rotation.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
        }
    }

    pub fn at(position: impl Into<Vector3<f32>>) -> Self {
        Self {
            position: position.into(),
            ..Self::new()
        }
    }

    pub fn with_rotation(mut self, roll: f32, pitch: f32, yaw: f32) -> Self {
        self.roll = roll;
        self.pitch = pitch;
        self.yaw = yaw;
        self
    }

    /// `Rz * Ry * Rx`: X is applied to a vertex first.
    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_z(Deg(-self.yaw))
            * Matrix4::from_angle_y(Deg(self.pitch))
            * Matrix4::from_angle_x(Deg(self.roll))
    }

    /// Undo [`Self::rotation_matrix`]: negated angles, reverse order.
    pub fn inverse_rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Deg(-self.roll))
            * Matrix4::from_angle_y(Deg(-self.pitch))
            * Matrix4::from_angle_z(Deg(self.yaw))
    }

    /// The model matrix uploaded for this object.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * self.rotation_matrix()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector4};

    use cgmath::SquareMatrix;

    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_identity(m: Matrix4<f32>) {
        let identity = Matrix4::<f32>::identity();
        for col in 0..4 {
            for row in 0..4 {
                assert!(
                    (m[col][row] - identity[col][row]).abs() < EPSILON,
                    "entry [{col}][{row}] is {} in {m:?}",
                    m[col][row]
                );
            }
        }
    }

    #[test]
    fn rotation_then_inverse_is_identity() {
        let angles = [-270.0, -135.0, -90.0, -33.3, 0.0, 12.5, 45.0, 90.0, 181.0, 359.0];
        for &roll in &angles {
            for &pitch in &angles {
                for &yaw in &angles {
                    let t = Transform::new().with_rotation(roll, pitch, yaw);
                    assert_identity(t.inverse_rotation_matrix() * t.rotation_matrix());
                }
            }
        }
    }

    #[test]
    fn roll_is_applied_before_yaw() {
        // X by 90 sends +Y to +Z, which Z by 90 leaves alone.
        let t = Transform::new().with_rotation(90.0, 0.0, 90.0);
        let v = t.to_matrix() * Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert!((v.truncate() - Vector3::new(0.0, 0.0, 1.0)).magnitude() < EPSILON);
    }

    #[test]
    fn translation_comes_last() {
        let t = Transform::at([1.0, 2.0, 3.0]).with_rotation(0.0, 90.0, 0.0);
        let origin = t.to_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.truncate() - Vector3::new(1.0, 2.0, 3.0)).magnitude() < EPSILON);
    }

    fn rotate(roll: f32, pitch: f32, yaw: f32, v: Vector3<f32>) -> Vector3<f32> {
        let t = Transform::new().with_rotation(roll, pitch, yaw);
        (t.to_matrix() * v.extend(0.0)).truncate()
    }

    fn assert_close(actual: Vector3<f32>, expected: Vector3<f32>) {
        assert!((actual - expected).magnitude() < EPSILON, "{actual:?} != {expected:?}");
    }

    #[test]
    fn each_axis_turns_its_own_way() {
        assert_close(rotate(90.0, 0.0, 0.0, Vector3::unit_y()), Vector3::unit_z());
        assert_close(rotate(0.0, 90.0, 0.0, Vector3::unit_x()), -Vector3::unit_z());
        assert_close(rotate(0.0, 0.0, 90.0, Vector3::unit_x()), -Vector3::unit_y());
        assert_close(rotate(0.0, 0.0, 90.0, Vector3::unit_y()), Vector3::unit_x());
    }

    #[test]
    fn default_is_identity() {
        assert_identity(Transform::default().to_matrix());
    }
}
