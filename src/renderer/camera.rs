use ash::vk;
use glam::{Mat4, Quat, Vec2, Vec3};

/// Fixed 2D camera over a pixel-space scene. The projection maps pixel units
/// to clip space with the origin at the center of the surface and y growing
/// downwards.
pub struct Camera {
    pub position: Vec2,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
        }
    }

    pub fn proj_mat(&self, extent: vk::Extent2D) -> Mat4 {
        Mat4::from_scale(Vec3::new(
            2.0 / extent.width as f32,
            -2.0 / extent.height as f32,
            1.0,
        ))
    }

    pub fn view_mat(&self) -> Mat4 {
        Mat4::from_translation((-self.position).extend(0.0))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Model matrix for a sprite quad: scale to the sprite's pixel size, rotate
/// around z, then translate to its position.
pub fn sprite_model_mat(position: Vec2, rotation_rad: f32, size: Vec2) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        size.extend(1.0),
        Quat::from_rotation_z(rotation_rad),
        position.extend(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn projection_maps_half_extent_to_clip_corner() {
        let camera = Camera::new();
        let proj = camera.proj_mat(vk::Extent2D {
            width: 640,
            height: 480,
        });
        let corner = proj * Vec4::new(320.0, 240.0, 0.0, 1.0);
        assert!(corner.abs_diff_eq(Vec4::new(1.0, -1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn view_translates_opposite_to_camera_position() {
        let camera = Camera {
            position: Vec2::new(10.0, -4.0),
        };
        let moved = camera.view_mat() * Vec4::new(10.0, -4.0, 0.0, 1.0);
        assert_eq!(moved, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn unrotated_model_is_pure_scale() {
        let model = sprite_model_mat(Vec2::ZERO, 0.0, Vec2::new(4.0, 4.0));
        assert_eq!(model, Mat4::from_scale(Vec3::new(4.0, 4.0, 1.0)));
    }

    #[test]
    fn model_rotates_and_translates() {
        let rot = std::f32::consts::FRAC_PI_2;
        let model = sprite_model_mat(Vec2::new(3.0, 5.0), rot, Vec2::new(2.0, 2.0));
        let corner = model * Vec4::new(1.0, 0.0, 0.0, 1.0);
        // (2, 0) rotated 90 degrees lands on (0, 2), then shifted by (3, 5)
        assert!((corner.x - 3.0).abs() < 1e-5);
        assert!((corner.y - 7.0).abs() < 1e-5);
    }
}
