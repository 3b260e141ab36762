// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Point cloud reconstruction
pub mod reconstruction {
    /// Depth at which the camera model is evaluated while building the
    /// unprojection table. Each entry is divided by this value afterwards.
    pub const SYNTHETIC_DEPTH: f32 = 1000.0;

    /// Normal assigned to every reconstructed point (points toward the sensor)
    pub const PLACEHOLDER_NORMAL: [f32; 3] = [0.0, 0.0, -1.0];
}

/// Sphere and cylinder geometry
pub mod primitives {
    /// Smallest sector count accepted by sphere and cylinder builders
    pub const MIN_SECTOR_COUNT: u32 = 3;
    /// Smallest stack count accepted by the sphere builder
    pub const MIN_STACK_COUNT: u32 = 2;

    pub const DEFAULT_SPHERE_SECTORS: u32 = 24;
    pub const DEFAULT_SPHERE_STACKS: u32 = 12;
    pub const DEFAULT_CYLINDER_SECTORS: u32 = 16;

    /// Joint sphere radius (millimetres)
    pub const JOINT_RADIUS_MM: f32 = 24.0;

    /// Bone tube radius (millimetres). Fixed visual thickness, independent of body size.
    pub const BONE_RADIUS_MM: f32 = 12.0;

    /// Axis lengths at or below this are treated as degenerate
    pub const DEGENERATE_AXIS_EPSILON: f32 = 1e-6;
}

/// Render state shared by the pipeline and viewer
pub mod rendering {
    /// Depth attachment format
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Clear color for the viewport
    pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
        r: 0.02,
        g: 0.02,
        b: 0.03,
        a: 1.0,
    };

    /// Near clip plane (metres)
    pub const Z_NEAR: f32 = 0.05;
    /// Far clip plane (metres)
    pub const Z_FAR: f32 = 20.0;

    /// Default vertical field of view (degrees)
    pub const DEFAULT_FOV_DEGREES: f32 = 60.0;

    /// Sensor units are millimetres; view space is metres
    pub const MM_TO_M: f32 = 0.001;

    /// Uniform slots reserved up front, grown when a frame needs more
    pub const INITIAL_UNIFORM_SLOTS: u32 = 256;

    /// Initial point cloud vertex capacity (one VGA depth frame)
    pub const INITIAL_POINT_CAPACITY: usize = 640 * 480;
}

/// Capture loop pacing
pub mod timing {
    use super::Duration;

    /// Default sensor frame rate
    pub const DEFAULT_FPS: u32 = 30;

    /// Upper bound on a blocking capture call
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_millis(500);

    /// How often frame statistics are logged (in ticks)
    pub const STATS_LOG_INTERVAL: u64 = 300;
}

/// Body tracking
pub mod tracking {
    /// Captures held back while the tracker works on them
    pub const MAX_IN_FLIGHT_CAPTURES: usize = 4;
}

/// Color tables
pub mod colors {
    /// Per-body colors, indexed by body id modulo the table length
    pub const BODY_PALETTE: [[f32; 4]; 8] = [
        [0.90, 0.30, 0.25, 1.0],
        [0.25, 0.75, 0.35, 1.0],
        [0.25, 0.45, 0.95, 1.0],
        [0.95, 0.80, 0.20, 1.0],
        [0.80, 0.35, 0.90, 1.0],
        [0.20, 0.85, 0.85, 1.0],
        [0.95, 0.55, 0.15, 1.0],
        [0.60, 0.60, 0.60, 1.0],
    ];

    /// Default point cloud color (translucent white)
    pub const POINT_CLOUD: [f32; 4] = [1.0, 1.0, 1.0, 0.6];

    /// Color for a tracked body id
    pub fn body_color(body_id: u32) -> [f32; 4] {
        BODY_PALETTE[body_id as usize % BODY_PALETTE.len()]
    }
}

/// Synthetic depth source defaults
pub mod synthetic {
    /// Back wall distance (millimetres)
    pub const WALL_DEPTH_MM: u16 = 3500;
    /// Moving ball radius (millimetres)
    pub const BALL_RADIUS_MM: f32 = 350.0;
    /// Width of the invalid (zero depth) border in pixels
    pub const INVALID_BORDER_PX: u32 = 8;
    /// Every Nth column is dropped out to emulate missing returns
    pub const DROPOUT_COLUMN_STRIDE: u32 = 37;
    /// Floor plane height below the sensor (millimetres, +Y is down)
    pub const FLOOR_HEIGHT_MM: f32 = 900.0;
    /// Distance of the ball's orbit centre from the sensor (millimetres)
    pub const BALL_DEPTH_MM: f32 = 2600.0;
    /// Returned depth buffers kept for reuse
    pub const BUFFER_POOL_SIZE: usize = 4;
    /// Distance of the first synthetic body from the sensor (millimetres)
    pub const BODY_DEPTH_MM: f32 = 2200.0;
    /// Lateral spacing between synthetic bodies (millimetres)
    pub const BODY_SPACING_MM: f32 = 900.0;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Application name used for window title and config directory
    pub const APP_NAME: &str = "depthcloud";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_color_wraps() {
        assert_eq!(colors::body_color(0), colors::body_color(8));
        assert_ne!(colors::body_color(0), colors::body_color(1));
    }

    #[test]
    fn test_minimum_subdivision() {
        assert!(primitives::DEFAULT_SPHERE_SECTORS >= primitives::MIN_SECTOR_COUNT);
        assert!(primitives::DEFAULT_SPHERE_STACKS >= primitives::MIN_STACK_COUNT);
        assert!(primitives::DEFAULT_CYLINDER_SECTORS >= primitives::MIN_SECTOR_COUNT);
    }
}
