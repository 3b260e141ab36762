// SPDX-License-Identifier: GPL-3.0-only

//! Pinhole depth camera model

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Camera model seam used when building the unprojection table
pub trait DepthProjection {
    /// Depth image size as `(width, height)`
    fn resolution(&self) -> (u32, u32);

    /// Point in sensor space for pixel `(col, row)` observed at `depth`
    fn unproject(&self, col: f32, row: f32, depth: f32) -> Vec3;
}

/// Pinhole intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// Resolution the Kinect defaults were measured at
    pub const KINECT_BASE: (u32, u32) = (640, 480);

    /// Factory intrinsics for the Kinect depth camera at 640x480
    pub const fn kinect() -> Self {
        Self {
            fx: 594.21,
            fy: 591.04,
            cx: 339.5,
            cy: 242.7,
        }
    }

    /// Rescale intrinsics measured at `from` to a `to` image size
    pub fn scaled(self, from: (u32, u32), to: (u32, u32)) -> Self {
        let sx = to.0 as f32 / from.0.max(1) as f32;
        let sy = to.1 as f32 / from.1.max(1) as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
        }
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::kinect()
    }
}

/// Depth stream calibration as reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub width: u32,
    pub height: u32,
    pub intrinsics: Intrinsics,
}

impl Calibration {
    pub fn new(width: u32, height: u32, intrinsics: Intrinsics) -> Self {
        Self {
            width,
            height,
            intrinsics,
        }
    }

    /// Kinect factory intrinsics scaled to `width` x `height`
    pub fn kinect(width: u32, height: u32) -> Self {
        let intrinsics = Intrinsics::kinect().scaled(Intrinsics::KINECT_BASE, (width, height));
        Self::new(width, height, intrinsics)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl DepthProjection for Calibration {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn unproject(&self, col: f32, row: f32, depth: f32) -> Vec3 {
        let k = &self.intrinsics;
        Vec3::new(
            (col - k.cx) * depth / k.fx,
            (row - k.cy) * depth / k.fy,
            depth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_point_is_on_axis() {
        let calibration = Calibration::new(
            4,
            4,
            Intrinsics {
                fx: 2.0,
                fy: 2.0,
                cx: 2.0,
                cy: 1.0,
            },
        );
        assert_eq!(calibration.unproject(2.0, 1.0, 500.0), Vec3::new(0.0, 0.0, 500.0));
        assert_eq!(calibration.unproject(4.0, 1.0, 500.0), Vec3::new(500.0, 0.0, 500.0));
    }

    #[test]
    fn test_kinect_scaling() {
        let half = Calibration::kinect(320, 240);
        let k = Intrinsics::kinect();
        assert!((half.intrinsics.fx - k.fx * 0.5).abs() < 1e-4);
        assert!((half.intrinsics.cy - k.cy * 0.5).abs() < 1e-4);
        assert_eq!(Calibration::kinect(640, 480).intrinsics, k);
    }
}
