use crate::math::*;

/// A pinhole camera with an explicit orthonormal basis and a rectangular
/// sensor plane hanging in front of it.
///
/// The basis follows the look-at convention:
///   z_axis = normalize(origin − target)   (points back toward the camera)
///   x_axis = normalize(world_up × z_axis)
///   y_axis = normalize(z_axis × x_axis)
/// with world up fixed at (0, 0, 1). Primary rays go from the origin
/// through points on the sensor plane at `dist_to_surface` along −z_axis.
#[derive(Debug, Clone)]
pub struct Camera {
    pub origin: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub dist_to_surface: f32,
    pub surface_width: f32,
    pub surface_height: f32,
}

impl Default for Camera {
    /// At the world origin, looking toward +Y, with a 1×1 sensor at
    /// distance 1.
    fn default() -> Self {
        Self {
            origin: Point3::zero(),
            x_axis: Vec3::new(1.0, 0.0, 0.0),
            y_axis: Vec3::new(0.0, 0.0, 1.0),
            z_axis: Vec3::new(0.0, -1.0, 0.0),
            dist_to_surface: 1.0,
            surface_width: 1.0,
            surface_height: 1.0,
        }
    }
}

impl Camera {
    /// Re-derives the basis so the camera looks at `target`. Each step
    /// falls back to the default axis when the geometry degenerates (target
    /// at the origin, or looking straight along world up).
    pub fn look_at(&mut self, target: Point3) {
        let world_up = Vec3::new(0.0, 0.0, 1.0);
        self.z_axis = (self.origin - target).normalized_or(Vec3::new(0.0, -1.0, 0.0));
        self.x_axis = world_up
            .cross(self.z_axis)
            .normalized_or(Vec3::new(1.0, 0.0, 0.0));
        self.y_axis = self
            .z_axis
            .cross(self.x_axis)
            .normalized_or(Vec3::new(0.0, 0.0, 1.0));
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_width / self.surface_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unit(v: Vec3) {
        assert!((v.length() - 1.0).abs() < 1e-5, "not unit: {v}");
    }

    #[test]
    fn look_at_produces_orthonormal_basis() {
        let mut camera = Camera {
            origin: Point3::new(3.0, -2.0, 1.0),
            ..Camera::default()
        };
        camera.look_at(Point3::zero());

        assert_unit(camera.x_axis);
        assert_unit(camera.y_axis);
        assert_unit(camera.z_axis);
        assert!(camera.x_axis.dot(camera.y_axis).abs() < 1e-5);
        assert!(camera.y_axis.dot(camera.z_axis).abs() < 1e-5);
        assert!(camera.z_axis.dot(camera.x_axis).abs() < 1e-5);

        // z points from the target back toward the camera
        assert!(camera.z_axis.dot(camera.origin) > 0.0);
    }

    #[test]
    fn look_at_degenerate_target_keeps_defaults() {
        let mut camera = Camera::default();
        camera.look_at(Point3::zero());
        assert_eq!(camera.z_axis, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(camera.x_axis, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(camera.y_axis, Vec3::new(0.0, 0.0, 1.0));
    }
}
