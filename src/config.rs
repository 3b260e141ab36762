// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{app_info, colors, primitives, rendering, timing};
use crate::depth::{Calibration, Intrinsics};
use crate::errors::{AppError, AppResult};

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Initial inner width (logical pixels)
    pub width: u32,
    /// Initial inner height (logical pixels)
    pub height: u32,
    /// Start in borderless fullscreen
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: app_info::APP_NAME.to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Depth stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub depth_width: u32,
    pub depth_height: u32,
    pub fps: u32,
    /// Intrinsics at `depth_width` x `depth_height`. When absent the Kinect
    /// factory values are scaled to the configured resolution.
    pub intrinsics: Option<Intrinsics>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            depth_width: 640,
            depth_height: 480,
            fps: timing::DEFAULT_FPS,
            intrinsics: None,
        }
    }
}

impl SensorConfig {
    pub fn calibration(&self) -> Calibration {
        match self.intrinsics {
            Some(intrinsics) => Calibration::new(self.depth_width, self.depth_height, intrinsics),
            None => Calibration::kinect(self.depth_width, self.depth_height),
        }
    }
}

/// Primitive appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// RGBA color of the point cloud
    pub point_color: [f32; 4],
    pub joint_radius_mm: f32,
    pub bone_radius_mm: f32,
    pub sphere_sectors: u32,
    pub sphere_stacks: u32,
    pub cylinder_sectors: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_color: colors::POINT_CLOUD,
            joint_radius_mm: primitives::JOINT_RADIUS_MM,
            bone_radius_mm: primitives::BONE_RADIUS_MM,
            sphere_sectors: primitives::DEFAULT_SPHERE_SECTORS,
            sphere_stacks: primitives::DEFAULT_SPHERE_STACKS,
            cylinder_sectors: primitives::DEFAULT_CYLINDER_SECTORS,
            fov_degrees: rendering::DEFAULT_FOV_DEGREES,
        }
    }
}

/// Body tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub enabled: bool,
    pub max_bodies: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bodies: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub sensor: SensorConfig,
    pub render: RenderConfig,
    pub tracking: TrackingConfig,
}

impl Config {
    /// `<config_dir>/depthcloud/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_NAME).join("config.json"))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    warn!("No config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        config.validate()
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Clamp subdivisions to their minimums and reject settings nothing
    /// can be rendered with.
    pub fn validate(mut self) -> AppResult<Self> {
        if self.sensor.depth_width == 0 || self.sensor.depth_height == 0 {
            return Err(AppError::Config(format!(
                "depth resolution {}x{} is empty",
                self.sensor.depth_width, self.sensor.depth_height
            )));
        }
        if self.sensor.fps == 0 {
            return Err(AppError::Config("sensor fps must be positive".into()));
        }
        if let Some(k) = self.sensor.intrinsics {
            let finite = [k.fx, k.fy, k.cx, k.cy].iter().all(|v| v.is_finite());
            if !finite || k.fx <= 0.0 || k.fy <= 0.0 {
                return Err(AppError::Config(format!(
                    "intrinsics fx={} fy={} cx={} cy={} cannot unproject depth",
                    k.fx, k.fy, k.cx, k.cy
                )));
            }
        }
        if !(self.render.fov_degrees > 0.0 && self.render.fov_degrees < 180.0) {
            return Err(AppError::Config(format!(
                "field of view {} is outside (0, 180)",
                self.render.fov_degrees
            )));
        }

        let render = &mut self.render;
        render.sphere_sectors = render.sphere_sectors.max(primitives::MIN_SECTOR_COUNT);
        render.sphere_stacks = render.sphere_stacks.max(primitives::MIN_STACK_COUNT);
        render.cylinder_sectors = render.cylinder_sectors.max(primitives::MIN_SECTOR_COUNT);
        Ok(self)
    }
}
