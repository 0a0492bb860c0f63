/// Model transform applied to the whole scene
use nalgebra::{Matrix4, Vector3};

/// Non-uniform scale followed by a spin about the model's Y axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub scale: Vector3<f32>,
    pub rotation_y: f32,
}

impl ModelTransform {
    pub fn new(scale: Vector3<f32>) -> Self {
        Self {
            scale,
            rotation_y: 0.0,
        }
    }

    /// Spin by `rate` radians per millisecond over `dt` milliseconds
    pub fn advance(&mut self, dt: f32, rate: f32) {
        self.rotation_y += rate * dt;
    }

    /// `scale * rotation_y`: vertices are rotated first, then scaled
    pub fn matrix(&self) -> Matrix4<f32> {
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);
        let rotation = Matrix4::new_rotation(Vector3::new(0.0, self.rotation_y, 0.0));
        scale * rotation
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::new(Vector3::new(1.0, 1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_transform() {
        let transform = ModelTransform::default();
        assert_relative_eq!(transform.matrix(), Matrix4::identity());
    }

    #[test]
    fn test_advance_accumulates() {
        let mut transform = ModelTransform::default();
        transform.advance(16.0, 0.001);
        transform.advance(4.0, 0.001);
        assert_relative_eq!(transform.rotation_y, 0.02, epsilon = 1e-7);
    }

    #[test]
    fn test_rotation_before_scale() {
        let mut transform = ModelTransform::new(Vector3::new(0.1, -0.1, 0.1));
        transform.rotation_y = FRAC_PI_2;
        // +X turns to -Z, then the scale shrinks it
        let p = transform.matrix() * Vector4::new(1.0, 1.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(0.0, -0.1, -0.1, 1.0), epsilon = 1e-6);
    }
}
