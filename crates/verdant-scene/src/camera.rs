//! Orbit camera rig and the pose it produces

use bevy::math::{Dir3, Mat4, Ray3d, Vec2, Vec3, Vec4};
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::config::CameraConfig;

/// Lowest allowed elevation; keeps the camera above the floor
pub const MIN_ELEVATION: f32 = 0.1;
/// Highest allowed elevation; keeps the look-at basis from flipping
pub const MAX_ELEVATION: f32 = FRAC_PI_2 - 0.1;

/// Drawable area in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// CSS pixel position to normalized device coordinates (Y up)
    pub fn to_ndc(&self, position: Vec2) -> Option<Vec2> {
        if self.is_empty() {
            return None;
        }
        Some(Vec2::new(
            position.x / self.width * 2.0 - 1.0,
            1.0 - position.y / self.height * 2.0,
        ))
    }
}

/// Perspective camera placement for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: &Viewport) -> Mat4 {
        self.projection_matrix(viewport.aspect()) * self.view_matrix()
    }

    /// World-space ray from the camera through a point in NDC
    pub fn ray_from_ndc(&self, ndc: Vec2, viewport: &Viewport) -> Option<Ray3d> {
        let inverse = self.view_projection(viewport).inverse();
        let world = inverse * Vec4::new(ndc.x, ndc.y, 0.5, 1.0);
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let direction = Dir3::new(world.truncate() / world.w - self.position).ok()?;
        Some(Ray3d::new(self.position, direction))
    }
}

/// Orbit state around the scene origin; always valid
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    azimuth: f32,
    elevation: f32,
    radius: f32,
    sensitivity: f32,
    patrol_rate: f32,
    auto_patrol: bool,
    fov_y_radians: f32,
    near: f32,
    far: f32,
}

impl CameraRig {
    pub fn new(config: &CameraConfig, sensitivity: f32) -> Self {
        Self {
            azimuth: config.azimuth,
            elevation: config.elevation.clamp(MIN_ELEVATION, MAX_ELEVATION),
            radius: config.radius.max(0.01),
            sensitivity,
            patrol_rate: config.patrol_rate,
            auto_patrol: config.auto_patrol,
            fov_y_radians: config.fov_y_degrees.to_radians(),
            near: config.near,
            far: config.far,
        }
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn auto_patrol(&self) -> bool {
        self.auto_patrol
    }

    pub fn set_auto_patrol(&mut self, enabled: bool) {
        self.auto_patrol = enabled;
    }

    /// Apply a manual drag in pixels. Manual input always stops auto-patrol.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        self.auto_patrol = false;
        self.azimuth = (self.azimuth - dx * self.sensitivity).rem_euclid(TAU);
        self.elevation = (self.elevation + dy * self.sensitivity).clamp(MIN_ELEVATION, MAX_ELEVATION);
    }

    /// Advance auto-patrol by `dt` seconds; no-op while patrol is off
    pub fn tick(&mut self, dt: f32) {
        if self.auto_patrol {
            self.azimuth = (self.azimuth + self.patrol_rate * dt).rem_euclid(TAU);
        }
    }

    pub fn pose(&self) -> CameraPose {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        CameraPose {
            position: Vec3::new(
                self.radius * sin_az * cos_el,
                self.radius * sin_el,
                self.radius * cos_az * cos_el,
            ),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: self.fov_y_radians,
            near: self.near,
            far: self.far,
        }
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(&CameraConfig::default(), crate::config::InputConfig::default().drag_sensitivity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_stays_clamped() {
        let mut rig = CameraRig::default();
        let deltas = [
            (0.0, 10_000.0),
            (3.0, -250.0),
            (-40.0, -10_000.0),
            (1.0, 1.0),
            (0.0, 313.0),
            (-7.0, -0.5),
        ];
        for (dx, dy) in deltas.iter().cycle().take(60) {
            rig.drag(*dx, *dy);
            assert!(rig.elevation() >= MIN_ELEVATION);
            assert!(rig.elevation() <= MAX_ELEVATION);
        }
    }

    #[test]
    fn test_drag_stops_patrol() {
        let mut rig = CameraRig::default();
        rig.set_auto_patrol(true);
        rig.tick(1.0);
        let after_patrol = rig.azimuth();
        assert!((after_patrol - 0.62).abs() < 1e-5);

        rig.drag(2.0, 0.0);
        assert!(!rig.auto_patrol());
        let after_drag = rig.azimuth();
        rig.tick(5.0);
        assert_eq!(rig.azimuth(), after_drag);
    }

    #[test]
    fn test_pose_orbits_origin() {
        let rig = CameraRig::default();
        let pose = rig.pose();
        assert!((pose.position.length() - 22.0).abs() < 1e-4);
        assert!(pose.position.y > 0.0);
        assert_eq!(pose, rig.pose());
    }

    #[test]
    fn test_center_ray_points_at_origin() {
        let pose = CameraRig::default().pose();
        let viewport = Viewport::new(800.0, 600.0);
        let ray = pose.ray_from_ndc(Vec2::ZERO, &viewport).unwrap();
        let toward_origin = (-pose.position).normalize();
        assert!(ray.direction.dot(toward_origin) > 0.9999);
    }
}
