// SPDX-License-Identifier: GPL-3.0-only

//! Fixed viewpoint at the sensor

use glam::{Mat4, Vec3};

use crate::constants::rendering::{MM_TO_M, Z_FAR, Z_NEAR};
use crate::render::CameraMatrices;

/// Looks out of the sensor
///
/// Sensor space is millimetres with +X right, +Y down and +Z away from the
/// sensor. View space is right-handed metres looking down -Z, so the view
/// matrix scales to metres and flips Y and Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCamera {
    fov_y_radians: f32,
    aspect: f32,
}

impl ViewCamera {
    pub fn new(fov_degrees: f32, width: u32, height: u32) -> Self {
        let mut camera = Self {
            fov_y_radians: fov_degrees.to_radians(),
            aspect: 1.0,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// Track the surface aspect ratio; zero-sized viewports are ignored
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_scale(Vec3::new(MM_TO_M, -MM_TO_M, -MM_TO_M))
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, Z_NEAR, Z_FAR)
    }

    pub fn matrices(&self) -> CameraMatrices {
        CameraMatrices {
            view: self.view(),
            projection: self.projection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_point_ahead_of_sensor_is_visible() {
        let camera = ViewCamera::new(60.0, 1280, 720);
        let clip = camera.projection() * camera.view() * Vec4::new(0.0, 0.0, 2000.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_sensor_down_is_screen_down() {
        let camera = ViewCamera::new(60.0, 640, 480);
        let clip = camera.projection() * camera.view() * Vec4::new(300.0, 300.0, 2000.0, 1.0);
        assert!(clip.x / clip.w > 0.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_zero_viewport_keeps_aspect() {
        let mut camera = ViewCamera::new(60.0, 800, 400);
        camera.set_viewport(0, 0);
        assert_eq!(camera.aspect(), 2.0);
    }
}
